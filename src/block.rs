//! Block serializer: assembles a full block from its header, coinbase, and
//! remaining transactions, plus any per-coin trailer bytes.

use crate::template::TemplateTransaction;
use crate::types::varint;

/// Per-coin trailer policy applied after the ordinary transaction list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTrailers<'a> {
    /// Peercoin-lineage coins append a trailing signature slot, left for
    /// the daemon to fill.
    pub is_pos: bool,
    /// Litecoin MWEB extension block payload, appended when non-empty.
    pub mweb_payload: Option<&'a [u8]>,
}

/// Serializes a full block: `header ∥ varint(tx_count + 1) ∥ coinbase ∥
/// (raw tx.data for each template transaction, in order)`, plus any
/// per-coin trailers.
pub fn serialize_block(
    header: &[u8; 80],
    coinbase: &[u8],
    transactions: &[TemplateTransaction],
    trailers: BlockTrailers<'_>,
) -> Result<Vec<u8>, crate::error::InitError> {
    let mut block = Vec::with_capacity(80 + coinbase.len() + transactions.len() * 256);
    block.extend_from_slice(header);
    block.extend_from_slice(&varint::encode(transactions.len() as u64 + 1));
    block.extend_from_slice(coinbase);
    for tx in transactions {
        block.extend_from_slice(&tx.data_bytes()?);
    }

    if trailers.is_pos {
        block.push(0x00);
    }
    if let Some(payload) = trailers.mweb_payload {
        if !payload.is_empty() {
            block.push(0x01);
            block.extend_from_slice(payload);
        }
    }

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(data: &str) -> TemplateTransaction {
        TemplateTransaction {
            txid: None,
            hash: "00".repeat(32),
            data: data.to_string(),
        }
    }

    #[test]
    fn tx_count_includes_coinbase() {
        let header = [0u8; 80];
        let coinbase = vec![0xAA; 10];
        let transactions = vec![tx("deadbeef"), tx("cafebabe")];
        let block =
            serialize_block(&header, &coinbase, &transactions, BlockTrailers::default()).unwrap();
        assert_eq!(block[80], 3); // 2 txs + coinbase
        assert!(!block.ends_with(&[0x00]) || block.len() > 80);
    }

    #[test]
    fn pos_appends_trailing_zero_byte() {
        let header = [0u8; 80];
        let coinbase = vec![0xAA; 4];
        let block = serialize_block(
            &header,
            &coinbase,
            &[],
            BlockTrailers {
                is_pos: true,
                mweb_payload: None,
            },
        )
        .unwrap();
        assert_eq!(*block.last().unwrap(), 0x00);
    }

    #[test]
    fn non_pos_does_not_append_trailing_byte() {
        let header = [0u8; 80];
        let coinbase = vec![0xFF; 4];
        let block =
            serialize_block(&header, &coinbase, &[], BlockTrailers::default()).unwrap();
        assert_eq!(*block.last().unwrap(), 0xFF);
    }

    #[test]
    fn mweb_payload_is_appended_with_marker() {
        let header = [0u8; 80];
        let coinbase = vec![0xFF; 4];
        let payload = vec![0x11, 0x22, 0x33];
        let block = serialize_block(
            &header,
            &coinbase,
            &[],
            BlockTrailers {
                is_pos: false,
                mweb_payload: Some(&payload),
            },
        )
        .unwrap();
        assert_eq!(&block[block.len() - 4..], &[0x01, 0x11, 0x22, 0x33]);
    }

    #[test]
    fn empty_mweb_payload_is_not_appended() {
        let header = [0u8; 80];
        let coinbase = vec![0xFF; 4];
        let payload: Vec<u8> = Vec::new();
        let block = serialize_block(
            &header,
            &coinbase,
            &[],
            BlockTrailers {
                is_pos: false,
                mweb_payload: Some(&payload),
            },
        )
        .unwrap();
        assert_eq!(block.len(), 84);
    }
}
