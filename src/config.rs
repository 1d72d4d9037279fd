//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `CORTEX_*`
//! environment variables, then command-line flags (applied by the caller).
//!
//! ```toml
//! transport = "all"
//! host = "0.0.0.0"
//! port = 5173
//! api_key = "change-me"
//! sse_keepalive_secs = 30
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::AuthConfig;
use crate::error::ConfigError;
use crate::server::TransportKind;
use crate::transport::sse::KEEPALIVE_INTERVAL;

/// Default HTTP port (WebSocket uses port + 1 in composite mode)
pub const DEFAULT_PORT: u16 = 5173;

pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const ENV_TRANSPORT: &str = "CORTEX_TRANSPORT";
pub const ENV_HOST: &str = "CORTEX_HOST";
pub const ENV_PORT: &str = "CORTEX_PORT";
pub const ENV_API_KEY: &str = "CORTEX_API_KEY";

/// Effective server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub sse_keepalive: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            sse_keepalive: KEEPALIVE_INTERVAL,
        }
    }
}

/// On-disk form. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    transport: Option<TransportKind>,
    host: Option<String>,
    port: Option<u16>,
    api_key: Option<String>,
    sse_keepalive_secs: Option<u64>,
}

impl ServerConfig {
    /// Defaults overlaid with the file at `path`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// Load defaults, optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if file.api_key.is_some() {
            self.api_key = file.api_key;
        }
        if let Some(secs) = file.sse_keepalive_secs {
            self.sse_keepalive = Duration::from_secs(secs);
        }
    }

    /// Overlay environment variables, read through `lookup`
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_TRANSPORT) {
            self.transport = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TRANSPORT,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_HOST) {
            self.host = value;
        }
        if let Some(value) = lookup(ENV_PORT) {
            self.port = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_API_KEY) {
            self.api_key = Some(value);
        }
        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.api_key.as_deref(), Some("")) {
            return Err(ConfigError::EmptyApiKey);
        }
        if self.sse_keepalive.is_zero() {
            return Err(ConfigError::ZeroKeepalive);
        }
        if self.transport == TransportKind::All && (self.port == 0 || self.port == u16::MAX) {
            return Err(ConfigError::CompositePort(self.port));
        }
        Ok(())
    }

    pub fn http_port(&self) -> u16 {
        self.port
    }

    /// WebSocket sits next to HTTP when both run
    pub fn websocket_port(&self) -> u16 {
        match self.transport {
            TransportKind::All => self.port.saturating_add(1),
            _ => self.port,
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.api_key.clone())
    }
}
