//! Duplicate-submission registry.
//!
//! A shared, cloneable handle over a set of submission keys, guarded by
//! `parking_lot::Mutex` rather than an async lock: the submission hot path
//! is fully synchronous, so no `.await` point ever needs to cross this lock.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::hexutil::normalize_hex;

/// Tracks `(extranonce1, extranonce2, nTime, nonce)` tuples already
/// submitted for one [`crate::job::Job`]. No eviction: a Job's lifetime is
/// short, and it is retired wholesale on the next block template.
#[derive(Clone, Default)]
pub struct SubmissionRegistry {
    seen: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the normalized submission key for `(extranonce1, extranonce2,
    /// nTime, nonce)`. Comparison is case-insensitive, so every part is
    /// lowercased before concatenation.
    pub fn key(extranonce1: &str, extranonce2: &str, n_time: &str, nonce: &str) -> String {
        let mut key = String::with_capacity(
            extranonce1.len() + extranonce2.len() + n_time.len() + nonce.len(),
        );
        key.push_str(&normalize_hex(extranonce1));
        key.push_str(&normalize_hex(extranonce2));
        key.push_str(&normalize_hex(n_time));
        key.push_str(&normalize_hex(nonce));
        key
    }

    /// Atomically test-and-insert. Returns `true` iff the key was novel
    /// (i.e. this call is the one that gets to proceed).
    pub fn insert_if_absent(&self, key: String) -> bool {
        self.seen.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
