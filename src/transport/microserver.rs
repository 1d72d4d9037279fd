//! Minimal blocking HTTP/1.1 over any Read + Write stream.
//!
//! httparse-based parsing, deliberately small surface:
//! - One request per connection (no keep-alive)
//! - No chunked transfer encoding (rejected)
//! - POST requires Content-Length
//! - Header cap: 32 KiB, Body cap: 1 MiB (Read::take, not Content-Length trust)
//! - Streaming responses (SSE) write a head without Content-Length and keep going

use serde::Serialize;
use std::io::{self, Read, Write};
use tracing::error;

/// Maximum header section size (32 KiB)
const MAX_HEADER_SIZE: usize = 32 * 1024;

/// Maximum request body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1_048_576;

const SERIALIZE_FAILED: &[u8] = br#"{"error":"Failed to serialize response"}"#;

/// Parsed HTTP request (transport-free)
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers as borrowed pairs, for the auth gate
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// HTTP response to write back
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// JSON body with the given status. A value that cannot be
    /// serialized becomes a 500 with a fixed error body.
    pub fn json(status: u16, value: &impl Serialize) -> Self {
        let (status, body) = match serde_json::to_vec(value) {
            Ok(body) => (status, body),
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                (500, SERIALIZE_FAILED.to_vec())
            }
        };
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    /// No body
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request that could not be parsed, with the status to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub status: u16,
    pub message: String,
}

impl RequestError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

/// Reason phrase for common status codes
fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Read and parse one HTTP request from a stream.
///
/// `Ok(None)` if the connection closed before any byte arrived.
pub fn read_request(stream: &mut impl Read) -> Result<Option<HttpRequest>, RequestError> {
    // Read header section with cap
    let mut header_buf = Vec::with_capacity(4096);
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                if header_buf.is_empty() {
                    return Ok(None);
                }
                return Err(RequestError::bad_request("Connection closed mid-request"));
            }
            Ok(_) => {
                header_buf.push(byte[0]);
                if header_buf.len() > MAX_HEADER_SIZE {
                    return Err(RequestError::bad_request("Headers too large"));
                }
                if header_buf.ends_with(b"\r\n\r\n") {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if header_buf.is_empty() {
                    return Ok(None);
                }
                return Err(RequestError::bad_request(format!("Read error: {}", e)));
            }
        }
    }

    let mut parsed_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut parsed_headers);

    match req.parse(&header_buf) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(RequestError::bad_request("Incomplete HTTP request"));
        }
        Err(e) => {
            return Err(RequestError::bad_request(format!("HTTP parse error: {}", e)));
        }
    }

    let method = req.method.unwrap_or("").to_string();
    // Routing ignores the query string
    let path = req
        .path
        .unwrap_or("/")
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    let mut headers = Vec::with_capacity(req.headers.len());
    let mut content_length: Option<usize> = None;
    let mut chunked = false;

    for h in req.headers.iter() {
        let name = h.name.to_string();
        let value = String::from_utf8_lossy(h.value).to_string();

        if name.eq_ignore_ascii_case("Content-Length") {
            content_length = value.trim().parse().ok();
        }
        if name.eq_ignore_ascii_case("Transfer-Encoding")
            && value.to_lowercase().contains("chunked")
        {
            chunked = true;
        }

        headers.push((name, value));
    }

    if chunked {
        return Err(RequestError::bad_request(
            "Chunked transfer encoding not supported",
        ));
    }

    let body = if method == "POST" || method == "PUT" || method == "PATCH" {
        let Some(len) = content_length else {
            return Err(RequestError::bad_request("POST requires Content-Length"));
        };
        if len > MAX_BODY_SIZE {
            return Err(RequestError {
                status: 413,
                message: "Request body too large".to_string(),
            });
        }
        let mut body = Vec::with_capacity(len);
        stream
            .take(len as u64)
            .read_to_end(&mut body)
            .map_err(|e| RequestError::bad_request(format!("Read error: {}", e)))?;
        if body.len() < len {
            return Err(RequestError::bad_request("Connection closed mid-body"));
        }
        body
    } else {
        Vec::new()
    };

    Ok(Some(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

/// Write a complete HTTP response. Errors are ignored: the client may be gone.
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason(response.status)
    );
    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    head.push_str("Connection: close\r\n");
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    if !response.body.is_empty() {
        let _ = stream.write_all(&response.body);
    }
    let _ = stream.flush();
}

/// Write the head of an open-ended `text/event-stream` response.
pub fn write_event_stream_head(
    stream: &mut impl Write,
    extra_headers: &[(String, String)],
) -> io::Result<()> {
    let mut head = String::from("HTTP/1.1 200 OK\r\n");
    head.push_str("Content-Type: text/event-stream\r\n");
    head.push_str("Cache-Control: no-cache\r\n");
    head.push_str("Connection: keep-alive\r\n");
    for (name, value) in extra_headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_get_request() {
        let raw = b"GET /health?verbose=1 HTTP/1.1\r\nHost: localhost\r\nX-Api-Key: k\r\n\r\n";
        let mut stream = Cursor::new(raw.to_vec());
        let req = read_request(&mut stream).unwrap().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/health");
        assert_eq!(req.header("x-api-key"), Some("k"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_parse_post_with_body() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let raw = format!(
            "POST /mcp HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut stream = Cursor::new(raw.into_bytes());
        let req = read_request(&mut stream).unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/mcp");
        assert_eq!(String::from_utf8_lossy(&req.body), body);
    }

    #[test]
    fn test_reject_chunked() {
        let raw = b"POST /mcp HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let err = read_request(&mut Cursor::new(raw.to_vec())).unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("Chunked"));
    }

    #[test]
    fn test_post_requires_content_length() {
        let raw = b"POST /mcp HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let err = read_request(&mut Cursor::new(raw.to_vec())).unwrap_err();
        assert!(err.message.contains("Content-Length"));
    }

    #[test]
    fn test_oversized_body_is_413() {
        let raw = format!(
            "POST /mcp HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_SIZE + 1
        );
        let err = read_request(&mut Cursor::new(raw.into_bytes())).unwrap_err();
        assert_eq!(err.status, 413);
    }

    #[test]
    fn test_truncated_body() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let err = read_request(&mut Cursor::new(raw.to_vec())).unwrap_err();
        assert!(err.message.contains("mid-body"));
    }

    #[test]
    fn test_unserializable_json_is_500() {
        // Map keys must be strings in JSON
        let mut bad = std::collections::BTreeMap::new();
        bad.insert((1, 2), "pair");
        let resp = HttpResponse::json(200, &bad);
        assert_eq!(resp.status, 500);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["error"], "Failed to serialize response");

        let ok = HttpResponse::json(201, &serde_json::json!({"a": 1}));
        assert_eq!(ok.status, 201);
        assert_eq!(ok.body, br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn test_write_response() {
        let resp = HttpResponse::json(200, &serde_json::json!({})).with_header("X-Test", "1");
        let mut buf = Vec::new();
        write_response(&mut buf, &resp);
        let output = String::from_utf8_lossy(&buf);
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(output.contains("Content-Length: 2\r\n"));
        assert!(output.contains("Connection: close\r\n"));
        assert!(output.contains("Content-Type: application/json\r\n"));
        assert!(output.contains("X-Test: 1\r\n"));
        assert!(output.ends_with("{}"));
    }

    #[test]
    fn test_event_stream_head_has_no_length() {
        let mut buf = Vec::new();
        write_event_stream_head(&mut buf, &[]).unwrap();
        let output = String::from_utf8_lossy(&buf);
        assert!(output.contains("Content-Type: text/event-stream\r\n"));
        assert!(!output.contains("Content-Length"));
        assert!(output.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_empty_stream_returns_none() {
        let mut stream = Cursor::new(Vec::<u8>::new());
        assert!(read_request(&mut stream).unwrap().is_none());
    }

    #[test]
    fn test_headers_too_large() {
        let huge_header = format!(
            "GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n",
            "A".repeat(MAX_HEADER_SIZE)
        );
        let err = read_request(&mut Cursor::new(huge_header.into_bytes())).unwrap_err();
        assert!(err.message.contains("too large"));
    }
}
