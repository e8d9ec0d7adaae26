//! Errors raised by [`crate::Store`] implementations.

use thiserror::Error;

/// Failure modes for [`crate::Store`] operations (§7 "application failure"
/// and "configuration failure" cross the store boundary as this type).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend (redb, or an I/O layer beneath it) failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}
