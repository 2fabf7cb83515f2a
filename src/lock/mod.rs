//! Per-record locks.
//!
//! Status transitions are read-modify-write cycles against the document
//! store. [`RecordLocks`] serializes them per `"collection:id"` key so two
//! concurrent transitions on the same record cannot both validate against a
//! stale read.

mod in_memory;

use thiserror::Error;

pub use in_memory::{RecordGuard, RecordLocks};

/// Error type for lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The lock table was poisoned (a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}
