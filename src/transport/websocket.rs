//! WebSocket transport
//!
//! Single route `/ws`. Each connection gets its own thread and receive
//! loop, so a bad frame or a dropped peer only ends that connection.
//!
//! Connection lifecycle:
//! 1. Handshake (non-`/ws` paths refused with 404)
//! 2. Auth on handshake headers; failure closes with code 4001
//! 3. `connected` event
//! 4. Text frame in → JSON-RPC response out, strictly in order

use serde_json::json;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::handshake::HandshakeError;
use tungstenite::http::StatusCode;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::{Message, WebSocket};

use super::Context;
use crate::error::TransportError;

pub const WS_PATH: &str = "/ws";

/// Close code sent when the API key check fails
pub const UNAUTHORIZED_CLOSE_CODE: u16 = 4001;

/// How long a client may take to complete the handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout between shutdown checks
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Polls spent waiting for the peer to acknowledge our close frame
const CLOSE_DRAIN_POLLS: usize = 10;

/// Bound WebSocket listener, not yet serving
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve on a background accept thread
    pub fn spawn(self, ctx: Context) -> io::Result<JoinHandle<()>> {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "websocket transport listening");
        }
        let shutdown = ctx.shutdown.clone();
        super::spawn_accept_loop("ws", self.listener, shutdown, move |stream, peer| {
            match handle_connection(stream, &ctx) {
                Ok(()) => debug!(%peer, "websocket closed"),
                Err(e) => debug!(%peer, error = %e, "websocket connection ended"),
            }
        })
    }
}

fn handle_connection(stream: TcpStream, ctx: &Context) -> Result<(), TransportError> {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    let mut authorized = false;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() != WS_PATH {
            return Err(not_found());
        }
        let headers = req
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
        authorized = ctx.gate.authenticate(headers);
        Ok(resp)
    };

    let mut ws = match tungstenite::accept_hdr(stream, callback) {
        Ok(ws) => ws,
        Err(HandshakeError::Failure(e)) => {
            debug!(error = %e, "websocket handshake failed");
            return Ok(());
        }
        Err(HandshakeError::Interrupted(_)) => {
            debug!("websocket handshake timed out");
            return Ok(());
        }
    };
    ws.get_ref().set_read_timeout(Some(POLL_INTERVAL))?;

    if !authorized {
        debug!("websocket rejected: bad or missing api key");
        close_with(
            &mut ws,
            CloseCode::from(UNAUTHORIZED_CLOSE_CODE),
            "Unauthorized",
        );
        return Ok(());
    }

    let connected = json!({
        "event": "connected",
        "data": {"status": "Cortex MCP Server connected"}
    });
    ws.send(Message::Text(connected.to_string()))?;

    receive_loop(&mut ws, ctx)
}

fn receive_loop(ws: &mut WebSocket<TcpStream>, ctx: &Context) -> Result<(), TransportError> {
    loop {
        if ctx.shutdown.is_triggered() {
            close_with(ws, CloseCode::Away, "Server shutting down");
            return Ok(());
        }

        let text = match ws.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                close_with(ws, CloseCode::Unsupported, "Binary frames are not supported");
                return Ok(());
            }
            // Ping/pong are answered by tungstenite; Close is acknowledged
            // on the next read, which then reports ConnectionClosed.
            Ok(_) => continue,
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => continue,
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match ctx.dispatcher.handle_message(&text) {
            Ok(Some(response)) => {
                ws.send(Message::Text(serde_json::to_string(&response)?))?;
            }
            Ok(None) => {}
            Err(e) => {
                close_with(ws, CloseCode::Invalid, "Malformed JSON");
                return Err(e.into());
            }
        }
    }
}

/// Send a close frame and wait briefly for the peer's acknowledgement
fn close_with(ws: &mut WebSocket<TcpStream>, code: CloseCode, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if ws.close(Some(frame)).is_err() {
        return;
    }
    for _ in 0..CLOSE_DRAIN_POLLS {
        match ws.read() {
            Ok(_) => continue,
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => continue,
            Err(_) => break,
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn not_found() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Not found".to_string()));
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}
