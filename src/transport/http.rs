//! HTTP+SSE transport
//!
//! | Method | Path      | Auth | Behavior                               |
//! |--------|-----------|------|----------------------------------------|
//! | GET    | `/`       | no   | server identity + endpoint map         |
//! | GET    | `/health` | no   | liveness                               |
//! | POST   | `/mcp`    | yes  | JSON-RPC request in, response out      |
//! | GET    | `/sse`    | yes  | `connected`, then `ping` every interval |
//!
//! Auth only applies when an API key is configured.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::microserver::{self, HttpRequest, HttpResponse};
use super::{sse, Context};
use crate::mcp::SERVER_NAME;

const UNAUTHORIZED: &str = "Unauthorized - Invalid or missing API key";

/// Routes answered without an API key
const PUBLIC_PATHS: [&str; 2] = ["/", "/health"];

const KNOWN_PATHS: [&str; 4] = ["/", "/health", "/mcp", "/sse"];

/// Shared state for request handlers
pub struct HttpState {
    ctx: Context,
    keepalive: Duration,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl HttpState {
    pub fn new(ctx: Context, keepalive: Duration) -> Self {
        Self {
            ctx,
            keepalive,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server: &'static str,
    uptime_secs: u64,
}

/// What a routed request turns into
enum Reply {
    Full(HttpResponse),
    EventStream,
}

/// Add security headers to response
fn with_security_headers(response: HttpResponse) -> HttpResponse {
    response
        .with_header("X-Content-Type-Options", "nosniff")
        .with_header("X-Frame-Options", "DENY")
}

/// Consistent JSON error response
fn json_error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &serde_json::json!({"error": message}))
}

// === Transport-free handlers ===

fn route_request(request: &HttpRequest, state: &HttpState) -> Reply {
    let path = request.path.as_str();

    if !PUBLIC_PATHS.contains(&path) && !state.ctx.gate.authenticate(request.header_pairs()) {
        debug!(path, "rejected: bad or missing api key");
        return Reply::Full(json_error(401, UNAUTHORIZED));
    }

    let response = match (request.method.as_str(), path) {
        ("GET", "/") => handle_root(state),
        ("GET", "/health") => handle_health(state),
        ("POST", "/mcp") => handle_mcp(request, state),
        ("GET", "/sse") => return Reply::EventStream,
        (_, p) if KNOWN_PATHS.contains(&p) => json_error(405, "Method not allowed"),
        _ => json_error(404, "Not found"),
    };
    Reply::Full(response)
}

/// Handle GET /
fn handle_root(state: &HttpState) -> HttpResponse {
    HttpResponse::json(
        200,
        &serde_json::json!({
            "server": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at.to_rfc3339(),
            "endpoints": {
                "health": "/health",
                "mcp": "/mcp",
                "sse": "/sse"
            }
        }),
    )
}

/// Handle GET /health
fn handle_health(state: &HttpState) -> HttpResponse {
    HttpResponse::json(
        200,
        &HealthResponse {
            status: "ok",
            server: SERVER_NAME,
            uptime_secs: state.uptime_secs(),
        },
    )
}

/// Handle POST /mcp
fn handle_mcp(request: &HttpRequest, state: &HttpState) -> HttpResponse {
    let body = match std::str::from_utf8(&request.body) {
        Ok(body) => body,
        Err(e) => return json_error(500, &format!("Invalid UTF-8 body: {}", e)),
    };

    match state.ctx.dispatcher.handle_message(body) {
        Ok(Some(response)) => HttpResponse::json(200, &response),
        Ok(None) => HttpResponse::empty(202),
        Err(e) => json_error(500, &e.to_string()),
    }
}

// === Transport: connection handling ===

/// Handle one connection: one request, then close.
fn handle_connection(stream: &mut (impl Read + Write), state: &HttpState) {
    let request = match microserver::read_request(stream) {
        Ok(Some(request)) => request,
        Ok(None) => return,
        Err(e) => {
            let resp = with_security_headers(json_error(e.status, &e.message));
            microserver::write_response(stream, &resp);
            return;
        }
    };

    match route_request(&request, state) {
        Reply::Full(response) => {
            microserver::write_response(stream, &with_security_headers(response));
        }
        Reply::EventStream => serve_event_stream(stream, state),
    }
}

fn serve_event_stream(stream: &mut impl Write, state: &HttpState) {
    let headers = with_security_headers(HttpResponse::empty(200)).headers;
    let result = microserver::write_event_stream_head(stream, &headers)
        .and_then(|()| sse::run_keepalive(stream, state.keepalive, &state.ctx.shutdown));
    match result {
        Ok(()) => debug!("sse stream closed on shutdown"),
        Err(e) => debug!(error = %e, "sse client went away"),
    }
}

/// Bound HTTP listener, not yet serving
pub struct HttpTransport {
    listener: TcpListener,
}

impl HttpTransport {
    pub fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve on a background accept thread
    pub fn spawn(self, ctx: Context, keepalive: Duration) -> std::io::Result<JoinHandle<()>> {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "http transport listening");
        }
        let shutdown = ctx.shutdown.clone();
        let state = Arc::new(HttpState::new(ctx, keepalive));
        super::spawn_accept_loop("http", self.listener, shutdown, move |mut stream: TcpStream, peer| {
            debug!(%peer, "http connection");
            handle_connection(&mut stream, &state);
            if let Err(e) = stream.shutdown(SocketShutdown::Write) {
                if e.kind() != std::io::ErrorKind::NotConnected {
                    warn!(%peer, error = %e, "socket shutdown failed");
                }
            }
        })
    }
}
