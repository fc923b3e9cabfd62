//! Data model: block templates, coin configuration, worker context, and the
//! reward-extras bag.
//!
//! These are the JSON-shaped inputs the core consumes from a coin daemon's
//! `getblocktemplate` RPC (`BlockTemplate`) and the pool operator's
//! configuration (`CoinTemplate`, `PoolConfig`):
//! `#[derive(Debug, Clone, Deserialize)]`, doc-commented per field,
//! `#[serde(default)]` on anything optional.

use serde::Deserialize;

/// One transaction already selected for the block by the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateTransaction {
    #[serde(default)]
    pub txid: Option<String>,
    /// Hash in internal (little-endian) byte order, as hex.
    pub hash: String,
    /// Raw transaction bytes, as hex.
    pub data: String,
}

impl TemplateTransaction {
    pub fn data_bytes(&self) -> Result<Vec<u8>, crate::error::InitError> {
        hex::decode(&self.data).map_err(|_| crate::error::InitError::InvalidHex {
            field: "transactions[].data",
            value: self.data.clone(),
        })
    }

    /// `wtxid` in internal byte order, for the segwit (witness) merkle tree.
    /// Per `getblocktemplate`, `hash` is the wtxid; it equals the txid when
    /// the transaction carries no witness data.
    pub fn wtxid_bytes(&self) -> Result<[u8; 32], crate::error::InitError> {
        let reversed = crate::types::hexutil::reverse_hex_bytes(&self.hash)?;
        crate::types::hexutil::decode_fixed("transactions[].hash", &reversed)
    }

    /// `txid` in internal byte order, for the ordinary (non-witness) merkle
    /// tree. Falls back to `hash` when `txid` is absent — the daemon omits
    /// it exactly when the two would be identical.
    pub fn txid_bytes(&self) -> Result<[u8; 32], crate::error::InitError> {
        let field = self.txid.as_deref().unwrap_or(&self.hash);
        let reversed = crate::types::hexutil::reverse_hex_bytes(field)?;
        crate::types::hexutil::decode_fixed("transactions[].txid", &reversed)
    }
}

/// `coinbaseaux` from `getblocktemplate`: extra bytes some daemons ask to be
/// embedded in the coinbase `scriptSig` (e.g. pool identification flags).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinbaseAux {
    #[serde(default)]
    pub flags: Option<String>,
}

/// A single payout target: an address or raw scriptPubKey, and the amount
/// (satoshis) to deduct from `reward_to_pool` for it.
#[derive(Debug, Clone, Deserialize)]
pub struct RewardTarget {
    #[serde(default)]
    pub address: Option<String>,
    /// Raw scriptPubKey hex, used instead of `address` when the daemon
    /// supplies one directly (e.g. masternode payee scripts).
    #[serde(default)]
    pub script: Option<String>,
    pub amount: u64,
}

/// A masternode payout target, which may also carry a `coinbase_payload`
/// that mutates the coinbase transaction's version.
#[derive(Debug, Clone, Deserialize)]
pub struct MasternodeTarget {
    #[serde(flatten)]
    pub reward: RewardTarget,
    #[serde(default)]
    pub coinbase_payload: Option<String>,
}

/// MWEB (Litecoin extension block) trailer payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MwebExtra {
    #[serde(default)]
    pub payload: Option<String>,
}

/// A field that may appear as a single object or an array of objects in the
/// daemon's JSON. Resolved once, here, rather than branched on downstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// The coin-specific reward fields bag (`block_template.extra`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardExtras {
    #[serde(default)]
    pub payee: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub masternode: Option<OneOrMany<MasternodeTarget>>,
    #[serde(default)]
    pub founder: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub minerdevfund: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub minerfund: Option<OneOrMany<RewardTarget>>,
    #[serde(default, rename = "community-autonomous")]
    pub community_autonomous: Option<OneOrMany<RewardTarget>>,
    /// Always singular: no daemon observed pairing this with multiple
    /// targets the way the other reward-extras fields are.
    #[serde(default, rename = "coinbase-dev-reward")]
    pub coinbase_dev_reward: Option<RewardTarget>,
    #[serde(default)]
    pub foundation: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub community: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub datamining: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub developer: Option<OneOrMany<RewardTarget>>,
    #[serde(default)]
    pub mweb: Option<MwebExtra>,
}

/// Block template fetched from the coin daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockTemplate {
    pub height: u64,
    /// Big-endian hex, as returned by the daemon.
    pub previous_block_hash: String,
    pub version: i32,
    /// Compact target ("nBits"), 8-char hex.
    pub bits: String,
    /// 256-bit target, big-endian hex. Falls back to `bits` when absent.
    #[serde(default)]
    pub target: Option<String>,
    pub cur_time: u32,
    pub coinbase_value: u64,
    pub transactions: Vec<TemplateTransaction>,
    #[serde(default)]
    pub default_witness_commitment: Option<String>,
    #[serde(default)]
    pub coinbase_aux: CoinbaseAux,
    #[serde(default)]
    pub extra: RewardExtras,
}

/// Per-feature switches controlling which reward splits `RewardSplitter`
/// applies, and whether data-mining deducts from `reward_to_pool`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardFeatures {
    #[serde(default)]
    pub payee: bool,
    #[serde(default)]
    pub masternode: bool,
    #[serde(default)]
    pub founder: bool,
    #[serde(default)]
    pub minerdevfund: bool,
    #[serde(default)]
    pub minerfund: bool,
    #[serde(default)]
    pub community_autonomous: bool,
    #[serde(default)]
    pub coinbase_dev_reward: bool,
    #[serde(default)]
    pub foundation: bool,
    #[serde(default)]
    pub community: bool,
    #[serde(default)]
    pub datamining: bool,
    #[serde(default)]
    pub developer: bool,
    /// When true (the default), data-mining outputs are a parallel subsidy
    /// and do not deduct from `reward_to_pool`. A coin profile can flip
    /// this if that turns out to be the wrong semantics for it.
    #[serde(default = "default_true")]
    pub datamining_is_additive: bool,
}

fn default_true() -> bool {
    true
}

/// Per-coin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinTemplate {
    pub symbol: String,
    #[serde(default = "default_tx_version")]
    pub coinbase_tx_version: u32,
    #[serde(default)]
    pub coinbase_tx_comment: Option<String>,
    /// 256-bit max target, big-endian hex. `None` means Bitcoin's default.
    #[serde(default)]
    pub diff1: Option<String>,
    #[serde(default)]
    pub features: RewardFeatures,
    #[serde(default)]
    pub is_pos: bool,
    #[serde(default)]
    pub has_segwit: bool,
    #[serde(default)]
    pub has_mweb: bool,
    #[serde(default)]
    pub coinbase_ignore_aux_flags: bool,
    #[serde(default = "default_hasher")]
    pub coinbase_hasher: String,
    #[serde(default = "default_hasher")]
    pub header_hasher: String,
    #[serde(default = "default_hasher")]
    pub block_hasher: String,
}

fn default_tx_version() -> u32 {
    1
}

fn default_hasher() -> String {
    "sha256d".to_string()
}

/// Pool-operator configuration relevant to coinbase construction.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Pool payout address, for the final (remaining) coinbase output.
    pub pool_address: String,
    #[serde(default = "default_coinbase_string")]
    pub coinbase_string: String,
    /// Byte width of `extranonce1`, assigned per worker at subscribe time.
    /// Fixed pool-wide, so the coinbase splice point can be sized at
    /// `Job::init` without knowing any individual worker's value.
    #[serde(default = "default_extranonce1_size")]
    pub extranonce1_size: usize,
    #[serde(default = "default_extranonce2_size")]
    pub extranonce2_size: usize,
}

fn default_coinbase_string() -> String {
    "Miningcore".to_string()
}

fn default_extranonce1_size() -> usize {
    4
}

fn default_extranonce2_size() -> usize {
    4
}

/// Cluster-wide settings shared across every pool instance in a deployment,
/// as distinct from the single instance's own `PoolConfig`. Currently just
/// an identifying tag attached to structured log lines so operators running
/// more than one instance can tell them apart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub instance_id: String,
}

/// Per-worker context supplied by the Stratum transport layer.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub extranonce1: String,
    pub difficulty: f64,
    pub previous_difficulty: Option<PreviousDifficulty>,
    pub version_rolling_mask: Option<u32>,
}

/// A worker's difficulty prior to the most recent vardiff retarget, used
/// for the grace-window retry in `Job::process_share`.
#[derive(Debug, Clone, Copy)]
pub struct PreviousDifficulty {
    pub difficulty: f64,
    pub vardiff_last_update: u64,
}

/// Result of a validated share.
#[derive(Debug, Clone)]
pub struct Share {
    pub block_height: u64,
    pub network_difficulty: f64,
    pub difficulty: f64,
    pub is_block_candidate: bool,
    pub block_hash: Option<String>,
}

/// Source of the current time, injected so `Job::init`/`process_share` stay
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shape of a `getblocktemplate` response, trimmed to the fields this
    /// crate reads.
    const SAMPLE_TEMPLATE_JSON: &str = r#"{
        "height": 700000,
        "previous_block_hash": "00000000000000000001b1f7e4f8e8e8f0b1a1b1f7e4f8e8e8f0b1a1b1f7e4f",
        "version": 536870912,
        "bits": "1d00ffff",
        "cur_time": 1700000000,
        "coinbase_value": 625000000,
        "transactions": [
            {"hash": "aabbccdd00000000000000000000000000000000000000000000000000ff", "data": "deadbeef"}
        ],
        "coinbase_aux": {"flags": "deadbeef"},
        "extra": {
            "payee": {"address": "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "amount": 1000000}
        }
    }"#;

    #[test]
    fn block_template_deserializes_from_daemon_shaped_json() {
        let template: BlockTemplate = serde_json::from_str(SAMPLE_TEMPLATE_JSON)
            .expect("failed to parse sample block template JSON");
        assert_eq!(template.height, 700000);
        assert_eq!(template.bits, "1d00ffff");
        assert_eq!(template.transactions.len(), 1);
        assert_eq!(template.coinbase_aux.flags.as_deref(), Some("deadbeef"));
        match template.extra.payee {
            Some(OneOrMany::One(target)) => assert_eq!(target.amount, 1000000),
            other => panic!("expected a single payee target, got {other:?}"),
        }
    }
}
