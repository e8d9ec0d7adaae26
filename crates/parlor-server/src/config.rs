//! The three-file YAML configuration shape (§6 of the protocol spec).
//!
//! `shared_config.yml` must parse identically for both binaries; `server`
//! and `client` each also read their own file. Unknown keys are accepted
//! (no `deny_unknown_fields`); a missing required key or a type mismatch is
//! a [`ConfigError`] that the caller turns into a nonzero exit code;
//! nothing here retries or falls back to a default for a key the file was
//! supposed to provide.

use std::{path::Path, time::Duration};

use parlor_proto::HeaderWidths;
use serde::Deserialize;

/// Failure loading or parsing one of the three configuration files.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read (missing, unreadable, etc).
    #[error("failed to read {path}: {source}")]
    Read {
        /// The path that could not be read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file was read but did not parse as the expected shape: a missing
    /// required key or a type mismatch, per §6/§7.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The path that failed to parse.
        path: String,
        /// Underlying parse failure.
        #[source]
        source: serde_yaml::Error,
    },
}

fn load<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    serde_yaml::from_str(&text)
        .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
}

/// `shared_config.yml`: the frame header widths both peers must agree on.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedConfig {
    /// The `packets` table.
    pub packets: PacketWidthsConfig,
}

/// `shared_config.yml`'s `packets` table.
#[derive(Debug, Clone, Deserialize)]
pub struct PacketWidthsConfig {
    /// Byte width of the `type` header field.
    pub packet_type_bytes: usize,
    /// Byte width of the correlation `id` header field.
    pub packet_id_bytes: usize,
    /// Byte width of the `data_length` header field.
    pub packet_data_length_bytes: usize,
}

impl SharedConfig {
    /// Load `shared_config.yml` from `path`.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load(path)
    }

    /// The frame header widths this configuration describes.
    #[must_use]
    pub fn widths(&self) -> HeaderWidths {
        HeaderWidths {
            id_bytes: self.packets.packet_id_bytes,
            type_bytes: self.packets.packet_type_bytes,
            data_length_bytes: self.packets.packet_data_length_bytes,
        }
    }
}

/// `server_config.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The `database` table.
    pub database: DatabaseConfig,
    /// The `connection` table.
    pub connection: ServerConnectionConfig,
}

/// `server_config.yml`'s `database` table.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the embedded database file.
    pub filepath: String,
    /// Seconds allowed to open the database before giving up. The `redb`
    /// backend opens a local file and never blocks on network I/O, so this
    /// is read and validated but otherwise unused; it is kept because
    /// `server_config.yml` declares it and §6 only promises "any embedded
    /// relational store suffices," not that every backend needs it.
    pub connect_timeout: u64,
    /// Characters per issued token.
    pub token_length: usize,
    /// Alphabet tokens are drawn from.
    pub token_charset: String,
    /// Inclusive minimum username length.
    pub min_username_length: usize,
    /// Inclusive maximum username length.
    pub max_username_length: usize,
}

/// `server_config.yml`'s `connection` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConnectionConfig {
    /// Address to bind the listening socket to.
    pub listen_address: String,
    /// Port to bind the listening socket to.
    pub listen_port: u16,
    /// Seconds a freshly accepted socket may go without a valid first frame.
    pub authentication_timeout: u64,
}

impl ServerConfig {
    /// Load `server_config.yml` from `path`.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load(path)
    }

    /// The configured authentication timeout as a [`Duration`].
    #[must_use]
    pub fn authentication_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.authentication_timeout)
    }

    /// `listen_address:listen_port`, as passed to `TcpListener::bind`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.connection.listen_address, self.connection.listen_port)
    }
}

/// `client_config.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// The `connection` table.
    pub connection: ClientConnectionConfig,
    /// The `user` table.
    pub user: UserConfig,
    /// The `events` table.
    pub events: EventsConfig,
    /// The `gui` table.
    pub gui: GuiConfig,
}

/// `client_config.yml`'s `connection` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConnectionConfig {
    /// Address the client connects to.
    pub connect_address: String,
    /// Port the client connects to.
    pub connect_port: u16,
    /// Seconds to wait for the `Authenticate` response before giving up.
    pub authentication_timeout: u64,
}

/// `client_config.yml`'s `user` table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// The plaintext token presented at authentication.
    pub token: String,
}

/// `client_config.yml`'s `events` table.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Byte width of randomly generated event ids (distinct from wire
    /// packet ids; §4.4).
    pub event_id_bytes: usize,
}

/// `client_config.yml`'s `gui` table: where the out-of-scope HTTP/HTML
/// presentation layer listens. Not consumed by this crate; it exists so
/// that collaborator's config loader can read the same file, but it is
/// still validated here since all four tables live in one shared file.
#[derive(Debug, Clone, Deserialize)]
pub struct GuiConfig {
    /// Address the presentation layer binds to.
    pub host_address: String,
    /// Port the presentation layer binds to.
    pub host_port: u16,
}

impl ClientConfig {
    /// Load `client_config.yml` from `path`.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load(path)
    }

    /// The configured authentication timeout as a [`Duration`].
    #[must_use]
    pub fn authentication_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.authentication_timeout)
    }

    /// `connect_address:connect_port`, as passed to `TcpStream::connect`.
    #[must_use]
    pub fn connect_address(&self) -> String {
        format!("{}:{}", self.connection.connect_address, self.connection.connect_port)
    }
}
