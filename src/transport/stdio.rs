//! Stdio transport
//!
//! Newline-delimited JSON-RPC over stdin/stdout for a single local peer.
//! No auth: access to the process's stdio is the trust boundary.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::mcp::protocol::{Response, PARSE_ERROR};
use crate::mcp::Dispatcher;

/// Start the stdio loop on its own thread.
///
/// Errors inside the loop are logged at debug level only: stdio usually
/// breaks because the peer or the process is going away.
pub fn spawn(dispatcher: Arc<Dispatcher>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cortex-stdio".to_string())
        .spawn(move || {
            let reader = BufReader::new(std::io::stdin().lock());
            info!("stdio transport ready");
            // Unlocked handle: stdout is only held while a response is written
            match serve(reader, std::io::stdout(), &dispatcher) {
                Ok(()) => info!("stdio peer closed the stream"),
                Err(e) => debug!(error = %e, "stdio transport stopped"),
            }
        })
}

/// Receive, dispatch and answer lines until EOF.
///
/// Responses go out in the order requests arrive. Undecodable lines, bad
/// UTF-8 included, get a parse-error response and the loop keeps going.
/// Only an I/O failure on the stream itself ends it early.
pub fn serve<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    dispatcher: &Dispatcher,
) -> Result<(), TransportError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match dispatcher.handle_message(line) {
                Ok(Some(resp)) => resp,
                Ok(None) => continue,
                Err(e) => Response::error(None, PARSE_ERROR, &format!("Parse error: {}", e)),
            },
            Err(e) => Response::error(None, PARSE_ERROR, &format!("Parse error: {}", e)),
        };

        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }
}
