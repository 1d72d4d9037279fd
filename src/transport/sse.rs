//! Server-Sent Events keepalive stream
//!
//! `connected` once, then `ping` every interval until the client goes away
//! or the server shuts down. No dispatch happens on this stream.

use serde_json::json;
use std::io::{self, Write};
use std::time::Duration;

use super::shutdown::Shutdown;

/// Default interval between `ping` events
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// One SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: &'static str,
    pub data: String,
}

impl Event {
    pub fn connected() -> Self {
        Self {
            name: "connected",
            data: json!({"status": "Cortex MCP Server connected"}).to_string(),
        }
    }

    pub fn ping() -> Self {
        Self {
            name: "ping",
            data: json!({"status": "alive"}).to_string(),
        }
    }

    /// Wire form: `event:` line, one `data:` line per data line, blank line
    pub fn encode(&self) -> String {
        let mut out = format!("event: {}\n", self.name);
        for line in self.data.lines() {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    pub fn write_to(&self, stream: &mut impl Write) -> io::Result<()> {
        stream.write_all(self.encode().as_bytes())?;
        stream.flush()
    }
}

/// Drive the keepalive stream on an already-opened event-stream response.
///
/// Returns when a write fails (client disconnected) or on shutdown.
pub fn run_keepalive(
    stream: &mut impl Write,
    interval: Duration,
    shutdown: &Shutdown,
) -> io::Result<()> {
    Event::connected().write_to(stream)?;
    loop {
        if shutdown.wait_timeout(interval) {
            return Ok(());
        }
        Event::ping().write_to(stream)?;
    }
}
