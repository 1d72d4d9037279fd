//! Server supervisor
//!
//! Wires one store into one `ConnectionBinding`, builds the auth gate and
//! dispatcher, and starts the requested transports on their own threads.
//! Nothing here blocks: `start` returns a `RunningServer` handle.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::AuthGate;
use crate::binding::ConnectionBinding;
use crate::config::ServerConfig;
use crate::mcp::Dispatcher;
use crate::store::Store;
use crate::transport::{self, Context, HttpTransport, Shutdown, WebSocketTransport};

/// Which front ends to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON-RPC over stdin/stdout
    Stdio,
    /// HTTP POST /mcp plus the SSE keepalive stream
    Http,
    /// WebSocket on /ws
    Websocket,
    /// stdio (when piped), HTTP on port, WebSocket on port + 1
    All,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Websocket => "websocket",
            Self::All => "all",
        }
    }

    fn wants_stdio(self) -> bool {
        matches!(self, Self::Stdio | Self::All)
    }

    fn wants_http(self) -> bool {
        matches!(self, Self::Http | Self::All)
    }

    fn wants_websocket(self) -> bool {
        matches!(self, Self::Websocket | Self::All)
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "websocket" | "ws" => Ok(Self::Websocket),
            "all" => Ok(Self::All),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker thread and what it serves
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    /// Listener to poke on shutdown; stdio has none
    wake: Option<SocketAddr>,
}

/// Handle to the started transports
pub struct RunningServer {
    workers: Vec<Worker>,
    shutdown: Shutdown,
    binding: Arc<ConnectionBinding>,
    http_addr: Option<SocketAddr>,
    websocket_addr: Option<SocketAddr>,
}

impl RunningServer {
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket_addr
    }

    pub fn binding(&self) -> &Arc<ConnectionBinding> {
        &self.binding
    }

    /// Block until every transport has stopped.
    ///
    /// Network transports only stop on `shutdown`, so for HTTP/WebSocket
    /// this keeps the process alive. Stdio alone returns when the peer
    /// closes stdin.
    pub fn wait(self) {
        for worker in self.workers {
            if worker.handle.join().is_err() {
                error!(transport = worker.name, "transport thread panicked");
            }
        }
    }

    /// Stop the network transports and join their accept loops.
    ///
    /// Open SSE streams and WebSocket connections notice the signal at
    /// their next wait. The stdio worker is left to end at EOF.
    pub fn shutdown(self) {
        self.shutdown.trigger();
        for worker in self.workers {
            let Some(addr) = worker.wake else {
                continue;
            };
            transport::wake_listener(addr);
            if worker.handle.join().is_err() {
                error!(transport = worker.name, "transport thread panicked");
            }
        }
        info!("server stopped");
    }
}

/// Start the transports selected by `config` against `store`.
///
/// Only configuration problems abort start-up. A network transport that
/// fails to bind is logged and skipped; start-up fails only when nothing
/// could be started at all.
pub fn start(config: &ServerConfig, store: Arc<dyn Store>) -> Result<RunningServer> {
    config.validate().context("Invalid server configuration")?;

    let binding = Arc::new(ConnectionBinding::new());
    let backend = store.backend_name();
    binding.set(store)?;
    info!(backend, "store bound");

    let gate = AuthGate::new(config.auth_config());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&binding)));
    let shutdown = Shutdown::new();
    let ctx = Context::new(Arc::clone(&dispatcher), gate, shutdown.clone());

    let kind = config.transport;
    let mut workers = Vec::new();
    let mut http_addr = None;
    let mut websocket_addr = None;
    let mut stdio_started = false;

    if kind.wants_http() {
        let addr = (config.host.as_str(), config.http_port());
        match HttpTransport::bind(addr).and_then(|t| Ok((t.local_addr()?, t))) {
            Ok((local, transport)) => {
                let handle = transport
                    .spawn(ctx.clone(), config.sse_keepalive)
                    .context("Failed to start HTTP transport")?;
                http_addr = Some(local);
                workers.push(Worker {
                    name: "http",
                    handle,
                    wake: Some(local),
                });
            }
            Err(e) => error!(host = %config.host, port = config.http_port(), error = %e, "HTTP transport failed to bind"),
        }
    }

    if kind.wants_websocket() {
        let addr = (config.host.as_str(), config.websocket_port());
        match WebSocketTransport::bind(addr).and_then(|t| Ok((t.local_addr()?, t))) {
            Ok((local, transport)) => {
                let handle = transport
                    .spawn(ctx.clone())
                    .context("Failed to start WebSocket transport")?;
                websocket_addr = Some(local);
                workers.push(Worker {
                    name: "websocket",
                    handle,
                    wake: Some(local),
                });
            }
            Err(e) => error!(host = %config.host, port = config.websocket_port(), error = %e, "WebSocket transport failed to bind"),
        }
    }

    if kind.wants_stdio() {
        // Guard against running the protocol loop on an interactive shell
        if atty::isnt(atty::Stream::Stdin) {
            let handle = transport::stdio::spawn(Arc::clone(&dispatcher))
                .context("Failed to start stdio transport")?;
            workers.push(Worker {
                name: "stdio",
                handle,
                wake: None,
            });
            stdio_started = true;
        } else {
            warn!("stdin is a terminal; stdio transport not started");
        }
    }

    let network_requested = kind.wants_http() || kind.wants_websocket();
    if network_requested && http_addr.is_none() && websocket_addr.is_none() && !stdio_started {
        bail!("No transport could be started");
    }

    let auth_line = match ctx.gate.masked_key() {
        Some(masked) => format!("enabled (key {})", masked),
        None => "disabled".to_string(),
    };
    eprint!(
        "{}",
        banner(kind, http_addr, websocket_addr, stdio_started, &auth_line)
    );

    Ok(RunningServer {
        workers,
        shutdown,
        binding,
        http_addr,
        websocket_addr,
    })
}

/// Human-readable start-up summary. Never includes the full API key.
pub fn banner(
    kind: TransportKind,
    http_addr: Option<SocketAddr>,
    websocket_addr: Option<SocketAddr>,
    stdio: bool,
    auth: &str,
) -> String {
    let rule = "━".repeat(40);
    let mut out = format!("{}\n  Cortex MCP Server\n{}\n", rule, rule);

    if let Some(addr) = http_addr {
        out.push_str(&format!("  HTTP+SSE  : http://{}/mcp\n", addr));
        out.push_str(&format!("  SSE       : http://{}/sse\n", addr));
    }
    if let Some(addr) = websocket_addr {
        out.push_str(&format!("  WebSocket : ws://{}/ws\n", addr));
    }
    if stdio {
        out.push_str("  Transport : stdio\n");
    } else if kind == TransportKind::Stdio {
        out.push_str("  Transport : stdio (inactive: stdin is a terminal)\n");
    }
    out.push_str(&format!("  Auth      : {}\n", auth));
    out.push_str(&rule);
    out.push('\n');
    out
}
