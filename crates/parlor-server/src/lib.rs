//! The acceptor, per-connection server session driver, configuration
//! loading, and the `server`/`client` CLI binaries for the parlor chat
//! system.
//!
//! Everything here is the imperative shell around the Sans-IO pieces in
//! `parlor-core`, `parlor-proto`, `parlor-store`, and `parlor-client`: this
//! crate is the only one that touches a socket, a config file, or a logger
//! directly.

pub mod acceptor;
pub mod config;
pub mod connection;
mod error;

pub use error::ServerError;
