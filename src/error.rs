//! Error types for share submission and job construction.
//!
//! Two separate enums: a `ShareError` the caller is expected to see
//! routinely (malformed share, duplicate, low difficulty) and an
//! `InitError` for malformed input that should never happen in production
//! (missing template fields, unparseable target).

use thiserror::Error;

/// Returned by [`crate::job::Job::process_share`].
///
/// Every variant here is a normal, expected rejection reason — the Stratum
/// layer maps each to a protocol error code and the caller is not expected
/// to treat any of them as a bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// Malformed hex length, mask violation, or any other reason that
    /// doesn't warrant its own variant.
    #[error("{0}")]
    Other(String),

    /// The `(extranonce1, extranonce2, nTime, nonce)` tuple was already
    /// submitted for this job.
    #[error("duplicate share")]
    DuplicateShare,

    /// The share's hash exceeds both the worker's current and (if recent
    /// enough) previous difficulty target.
    #[error("low difficulty share")]
    LowDifficultyShare,
}

impl ShareError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Returned by [`crate::job::Job::init`].
///
/// These indicate a malformed block template or coin configuration — a
/// fatal construction failure, never a share rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("job_id must not be empty")]
    EmptyJobId,

    #[error("block template is missing required field: {0}")]
    MissingField(&'static str),

    #[error("could not parse {field} as hex: {value}")]
    InvalidHex { field: &'static str, value: String },

    #[error("target/bits did not parse to a valid 256-bit value")]
    InvalidTarget,

    #[error("reward split left reward_to_pool negative ({shortfall} sat short)")]
    RewardOverdraft { shortfall: u64 },

    #[error("no hash algorithm registered under the name {0:?}")]
    UnknownHashAlgorithm(String),
}

pub type ShareResult<T> = Result<T, ShareError>;
pub type InitResult<T> = Result<T, InitError>;
