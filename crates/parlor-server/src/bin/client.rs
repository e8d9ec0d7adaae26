//! `parlor-client`: connects to a `parlor-server`, authenticates, and then
//! serves the event queue that the (out-of-scope, §1) HTTP/HTML
//! presentation layer would otherwise submit input events against.
//!
//! Reads `shared_config.yml` and `client_config.yml` from the working
//! directory; takes no flags beyond what `clap` provides for free (§6.5).
//! Runs until the server drops the connection or the process is killed;
//! per §6, "until the local GUI is shut down" describes a collaborator this
//! binary does not itself implement.

use std::{net::TcpStream, process::ExitCode, time::Duration};

use clap::Parser;
use parlor_client::{ClientSession, ClientSessionConfig, EventQueue};
use parlor_server::config::{ClientConfig, SharedConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor chat client.
#[derive(Parser, Debug)]
#[command(name = "parlor-client")]
#[command(about = "Connects to a parlor-server and authenticates")]
#[command(version)]
struct Args;

fn main() -> ExitCode {
    let _args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "client failed to start");
            ExitCode::FAILURE
        },
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedConfig::load("shared_config.yml")?;
    let client_config = ClientConfig::load("client_config.yml")?;

    let stream = TcpStream::connect(client_config.connect_address())?;
    stream.set_nonblocking(true)?;

    let session_config = ClientSessionConfig {
        widths: shared.widths(),
        authentication_timeout: client_config.authentication_timeout(),
        backoff: Duration::from_millis(100),
    };

    let mut session = ClientSession::connect(stream, session_config, &client_config.user.token)?;
    tracing::info!(username = session.username(), "connected and authenticated");

    // Every `EventQueueHandle` clone keeps the queue open; holding one here
    // for the lifetime of `main` is what lets this binary idle waiting for
    // an out-of-scope producer instead of exiting the moment it connects.
    let (queue, _handle) = EventQueue::new();
    session.run(&queue);

    Ok(())
}
