//! Structured logging, tailored to this crate.
//!
//! This is a library, not a daemon, so there is no subscriber installer here
//! (the embedding Stratum server owns that). What's provided is just the
//! `prelude`, for convenient access to the `trace!()`, `debug!()`, `info!()`,
//! and `warn!()` macros with this crate's conventional fields
//! (`job_id`, `height`, `difficulty`) attached at the call site rather than
//! interpolated into the message string.

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}
