//! Cortex MCP server
//!
//! Exposes an embedded SQL store to tool-calling clients over stdio,
//! HTTP+SSE and WebSocket, all sharing one dispatcher and one store.

pub mod auth;
pub mod binding;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod server;
pub mod store;
pub mod transport;

// Re-export commonly used types
pub use auth::{AuthConfig, AuthGate};
pub use binding::ConnectionBinding;
pub use config::ServerConfig;
pub use mcp::Dispatcher;
pub use server::{start, RunningServer, TransportKind};
pub use store::{SqliteStore, Store};
