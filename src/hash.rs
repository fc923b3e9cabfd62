//! Hash capability: the pluggable boundary between this crate and whatever
//! library actually computes PoW digests.
//!
//! The contract: map byte input to a 32-byte digest, registered by string
//! identifier. Implemented here with `inventory` so coin-specific
//! algorithms can register themselves with `inventory::submit!` from
//! anywhere in the dependency graph without this crate needing to know
//! about them at compile time.

use bitcoin::hashes::{Hash, sha256d};

/// Side-inputs some hash algorithms need beyond the raw bytes (e.g.
/// time-variant proof-of-work). Most algorithms ignore all of these.
#[derive(Debug, Clone, Copy)]
pub struct HashContext<'a> {
    pub ntime: u32,
    pub height: u32,
    pub coin_symbol: &'a str,
    pub network: &'a str,
}

/// A hash capability: total over all 32-byte outputs. Hash-capability
/// failures are assumed impossible — implementations never error.
pub trait HashAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;
    fn digest(&self, input: &[u8], ctx: &HashContext<'_>) -> [u8; 32];
}

/// An algorithm's entry in the process-wide registry, submitted at
/// initialization time via `inventory::submit!`.
pub struct Registration {
    pub name: &'static str,
    pub algorithm: &'static dyn HashAlgorithm,
}

inventory::collect!(Registration);

/// Looks up a hash algorithm by the string identifier a `CoinTemplate`
/// names for `coinbase_hasher` / `header_hasher` / `block_hasher`.
pub struct HashRegistry;

impl HashRegistry {
    pub fn get(name: &str) -> Option<&'static dyn HashAlgorithm> {
        inventory::iter::<Registration>()
            .find(|r| r.name == name)
            .map(|r| r.algorithm)
    }
}

/// Double-SHA256 — Bitcoin's default for `coinbase_hasher`, `header_hasher`,
/// and `block_hasher`.
pub struct Sha256d;

impl HashAlgorithm for Sha256d {
    fn name(&self) -> &'static str {
        "sha256d"
    }

    fn digest(&self, input: &[u8], _ctx: &HashContext<'_>) -> [u8; 32] {
        sha256d::Hash::hash(input).to_byte_array()
    }
}

static SHA256D: Sha256d = Sha256d;

inventory::submit! {
    Registration { name: "sha256d", algorithm: &SHA256D }
}
