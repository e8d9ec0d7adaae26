//! Top-level errors the `server`/`client` binaries map to exit codes.

use thiserror::Error;

/// Errors raised while starting or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A configuration file failed to load (§7 "configuration failure").
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The listening socket could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address the server tried to bind.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The store's schema could not be created.
    #[error("storage initialization failed: {0}")]
    Storage(#[from] parlor_store::StoreError),
}
