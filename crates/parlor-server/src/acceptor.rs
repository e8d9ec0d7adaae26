//! The acceptor: binds the listening socket and spawns one thread per
//! accepted connection (§4.1 overview, §5 scheduling).
//!
//! Each spawned thread owns its [`std::net::TcpStream`] for the connection's
//! entire lifetime and removes itself (by returning) once
//! [`crate::connection::serve`] closes the session; there is no shared
//! session registry to clean up, since [`parlor_store::Store`]
//! implementations are cheap to clone and carry no per-connection state.

use std::net::TcpListener;

use parlor_store::Store;

use crate::{connection::ConnectionConfig, error::ServerError};

/// Bind `bind_address` and accept connections forever, spawning a thread
/// running [`crate::connection::serve`] for each one.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the listening socket cannot be bound.
pub fn run<S: Store>(bind_address: &str, store: S, config: ConnectionConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_address)
        .map_err(|source| ServerError::Bind { address: bind_address.to_string(), source })?;
    tracing::info!(address = bind_address, "listening");
    run_listener(listener, store, config);
    Ok(())
}

/// Accept connections forever on an already-bound `listener`. Split out
/// from [`run`] so tests (and any embedder that wants control over the
/// bind step, e.g. binding port `0` and reading back the chosen port) don't
/// need a config file on disk.
pub fn run_listener<S: Store>(listener: TcpListener, store: S, config: ConnectionConfig) {
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let peer = stream.peer_addr().ok();
                tracing::info!(?peer, "accepted connection");
                let store = store.clone();
                std::thread::spawn(move || {
                    crate::connection::serve(stream, store, config);
                    tracing::info!(?peer, "connection closed");
                });
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
            },
        }
    }
}
