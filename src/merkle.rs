//! Merkle-branch precomputation.
//!
//! Builds the branch steps from the non-coinbase transaction leaves once,
//! so that `Job` can hand `with_first(coinbase_hash)` a candidate coinbase
//! hash for every worker's submitted share without rebuilding the tree.

use bitcoin::hashes::{Hash, sha256d};

fn double_sha256(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    sha256d::Hash::hash(&buf).to_byte_array()
}

/// Precomputed branch steps for combining a not-yet-known leaf (the
/// coinbase hash) into a merkle root, without knowing that leaf in advance.
///
/// Built once per [`crate::job::Job`] from the ordered, non-coinbase
/// transaction hashes (already in internal byte order). `with_first`
/// threads a candidate leaf up through the branch.
#[derive(Debug, Clone, Default)]
pub struct MerkleTreeBuilder {
    branches: Vec<[u8; 32]>,
}

impl MerkleTreeBuilder {
    /// Compute the branch steps for the given ordered leaves (`tx1..txn`,
    /// excluding the coinbase).
    ///
    /// At each level, if the *full* tree (including the not-yet-known
    /// leading leaf) would have an odd width, the last element is
    /// duplicated before pairing — this is the standard Bitcoin
    /// odd-duplication rule, applied one level ahead of where the
    /// known leaves actually sit.
    pub fn new(leaves: &[[u8; 32]]) -> Self {
        let mut level: Vec<[u8; 32]> = leaves.to_vec();
        let mut branches = Vec::new();

        while !level.is_empty() {
            if (level.len() + 1) % 2 != 0 {
                let last = *level.last().unwrap();
                level.push(last);
            }

            // level[0] is the sibling that will be paired with the
            // accumulated (coinbase-path) hash at this level.
            branches.push(level[0]);

            let rest = &level[1..];
            let mut next = Vec::with_capacity(rest.len() / 2);
            for pair in rest.chunks_exact(2) {
                next.push(double_sha256(&pair[0], &pair[1]));
            }
            level = next;
        }

        Self { branches }
    }

    /// The branch steps, in order (leaf-to-root), excluding the root.
    pub fn branches(&self) -> &[[u8; 32]] {
        &self.branches
    }

    /// Combine `first` (the coinbase hash, or any candidate leaf) with the
    /// precomputed branch to produce the merkle root.
    pub fn with_first(&self, first: [u8; 32]) -> [u8; 32] {
        self.branches
            .iter()
            .fold(first, |acc, step| double_sha256(&acc, step))
    }
}
