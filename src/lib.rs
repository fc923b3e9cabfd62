//! Per-job share validation and block assembly core for a Bitcoin-family
//! mining pool.
//!
//! Given a block template fetched from a coin daemon, this crate builds
//! the coinbase transaction, precomputes the Stratum job parameters
//! distributed to miners, and validates submitted shares against that job
//! — producing a rejection, an accepted low-difficulty share, or a fully
//! serialized block ready for the daemon's `submitblock`.
//!
//! Daemon RPC, the Stratum connection transport, persistence, and the hash
//! primitives themselves are external collaborators — this crate treats
//! hashing as a pluggable [`hash::HashAlgorithm`] capability and expects a
//! caller to supply block templates and carry submitted shares to
//! [`job::Job::process_share`].

pub mod block;
pub mod coinbase;
pub mod error;
pub mod hash;
pub mod job;
pub mod merkle;
pub mod registry;
pub mod reward;
pub mod template;
pub mod tracing;
pub mod types;

pub use error::{InitError, InitResult, ShareError, ShareResult};
pub use hash::{HashAlgorithm, HashContext, HashRegistry};
pub use job::{Job, StratumParams, VARDIFF_GRACE_SECS};
pub use merkle::MerkleTreeBuilder;
pub use registry::SubmissionRegistry;
pub use reward::{RewardOutput, RewardPlan, RewardSplitter};
pub use template::{
    BlockTemplate, Clock, CoinTemplate, CoinbaseAux, MasternodeTarget, MwebExtra, OneOrMany,
    PoolConfig, PreviousDifficulty, RewardExtras, RewardFeatures, RewardTarget, Share, SystemClock,
    TemplateTransaction, WorkerContext,
};
