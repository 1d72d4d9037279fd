//! Transport adapters
//!
//! Three independent front ends feed the same dispatcher:
//! - stdio: newline-delimited JSON-RPC, one local peer
//! - HTTP+SSE: blocking microserver, thread per connection
//! - WebSocket: tungstenite, thread per connection
//!
//! Design: blocking I/O on plain threads (no async runtime). Each
//! connection is its own failure domain.

pub mod http;
pub mod microserver;
pub mod shutdown;
pub mod sse;
pub mod stdio;
pub mod websocket;

pub use http::HttpTransport;
pub use shutdown::Shutdown;
pub use websocket::WebSocketTransport;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::auth::AuthGate;
use crate::mcp::Dispatcher;

/// What every network transport needs from the supervisor
#[derive(Clone)]
pub struct Context {
    pub dispatcher: Arc<Dispatcher>,
    pub gate: Arc<AuthGate>,
    pub shutdown: Shutdown,
}

impl Context {
    pub fn new(dispatcher: Arc<Dispatcher>, gate: AuthGate, shutdown: Shutdown) -> Self {
        Self {
            dispatcher,
            gate: Arc::new(gate),
            shutdown,
        }
    }
}

/// Accept connections until shutdown, one thread per connection.
///
/// The loop only notices shutdown after `accept` returns, so whoever
/// triggers it must also poke the listener (see [`wake_listener`]).
fn spawn_accept_loop<F>(
    name: &'static str,
    listener: TcpListener,
    shutdown: Shutdown,
    handler: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: Fn(TcpStream, SocketAddr) + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    thread::Builder::new()
        .name(format!("cortex-{}", name))
        .spawn(move || {
            for stream in listener.incoming() {
                if shutdown.is_triggered() {
                    break;
                }
                match stream {
                    Ok(stream) => {
                        let peer = match stream.peer_addr() {
                            Ok(peer) => peer,
                            Err(e) => {
                                debug!(transport = name, error = %e, "peer vanished before handling");
                                continue;
                            }
                        };
                        let handler = Arc::clone(&handler);
                        let spawned = thread::Builder::new()
                            .name(format!("cortex-{}-conn", name))
                            .spawn(move || (*handler)(stream, peer));
                        if let Err(e) = spawned {
                            warn!(transport = name, error = %e, "failed to spawn connection thread");
                        }
                    }
                    Err(e) => warn!(transport = name, error = %e, "accept error"),
                }
            }
            debug!(transport = name, "accept loop stopped");
        })
}

/// Unblock a listener stuck in `accept` by connecting to it once
pub fn wake_listener(addr: SocketAddr) {
    let target = if addr.ip().is_unspecified() {
        match addr {
            SocketAddr::V4(_) => SocketAddr::from(([127, 0, 0, 1], addr.port())),
            SocketAddr::V6(_) => SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, addr.port())),
        }
    } else {
        addr
    };
    if let Err(e) = TcpStream::connect(target) {
        debug!(%target, error = %e, "wake connect failed");
    }
}
