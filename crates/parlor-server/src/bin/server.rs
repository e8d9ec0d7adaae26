//! `parlor-server`: accepts connections and serves the chat protocol.
//!
//! Reads `shared_config.yml` and `server_config.yml` from the working
//! directory; takes no flags beyond what `clap` provides for free (§6.5).

use std::process::ExitCode;

use clap::Parser;
use parlor_server::{
    acceptor,
    config::{ServerConfig, SharedConfig},
    connection::ConnectionConfig,
};
use parlor_store::{AccountPolicy, RedbStore, Store};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor chat server.
#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "Serves the parlor chat wire protocol over TCP")]
#[command(version)]
struct Args;

fn main() -> ExitCode {
    let _args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed to start");
            ExitCode::FAILURE
        },
    }
}

fn run() -> Result<(), parlor_server::ServerError> {
    let shared = SharedConfig::load("shared_config.yml")?;
    let server = ServerConfig::load("server_config.yml")?;

    let policy = AccountPolicy {
        min_username_length: server.database.min_username_length,
        max_username_length: server.database.max_username_length,
        token_length: server.database.token_length,
        token_charset: server.database.token_charset.clone().into_bytes(),
    };
    let store = RedbStore::open(&server.database.filepath, policy)?;
    store.ensure_tables()?;

    let connection_config = ConnectionConfig {
        widths: shared.widths(),
        session: parlor_core::ServerSessionConfig {
            authentication_timeout: server.authentication_timeout(),
        },
        backoff: std::time::Duration::from_millis(100),
    };

    acceptor::run(&server.bind_address(), store, connection_config)
}
