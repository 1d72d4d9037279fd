//! Typed errors for the server core
//!
//! Only `ConfigError` is allowed to stop the process. Store failures are
//! rendered as text by the dispatcher, transport failures end one connection.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection is closed")]
    Closed,

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("{0}")]
    Unsupported(String),
}

/// Invalid startup parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("api key must not be empty")]
    EmptyApiKey,

    #[error("SSE keepalive interval must be greater than zero")]
    ZeroKeepalive,

    #[error("port {0} cannot host both HTTP and WebSocket (WebSocket uses port + 1)")]
    CompositePort(u16),
}

/// The connection binding was already set for this process
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("a database connection is already bound")]
    AlreadyBound,
}

/// Failure confined to a single client connection
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}
