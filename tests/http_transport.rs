//! HTTP+SSE transport against a live listener

mod common;

use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{start_http, tool_call, RecordingStore};
use cortex_mcp::SqliteStore;

const KEY: &str = "secret-key";

fn client() -> Result<Client> {
    Ok(Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()?)
}

fn mcp_url(addr: SocketAddr) -> String {
    format!("http://{}/mcp", addr)
}

#[test]
fn test_missing_key_is_rejected_before_dispatch() -> Result<()> {
    let store = Arc::new(RecordingStore::new()?);
    let (server, addr) = start_http(Some(KEY), store.clone())?;
    let client = client()?;

    let body = tool_call(1, "execute", json!({"sql": "CREATE TABLE t (x INTEGER)"}));
    let resp = client.post(mcp_url(addr)).body(body.clone()).send()?;
    assert_eq!(resp.status().as_u16(), 401);
    let error: Value = resp.json()?;
    assert_eq!(error["error"], "Unauthorized - Invalid or missing API key");

    let resp = client
        .post(mcp_url(addr))
        .header("x-api-key", "wrong")
        .body(body)
        .send()?;
    assert_eq!(resp.status().as_u16(), 401);

    // Neither request reached the store
    assert_eq!(store.calls(), 0);

    server.shutdown();
    Ok(())
}

#[test]
fn test_valid_key_dispatches() -> Result<()> {
    let store = Arc::new(RecordingStore::new()?);
    let (server, addr) = start_http(Some(KEY), store.clone())?;
    let client = client()?;

    let resp = client
        .post(mcp_url(addr))
        .header("X-API-Key", KEY)
        .body(tool_call(7, "execute", json!({"sql": "CREATE TABLE t (x INTEGER)"})))
        .send()?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers().get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    let body: Value = resp.json()?;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], "Executed successfully");
    assert_eq!(store.calls(), 1);

    server.shutdown();
    Ok(())
}

#[test]
fn test_no_key_configured_allows_everything() -> Result<()> {
    let (server, addr) = start_http(None, Arc::new(SqliteStore::open_in_memory()?))?;

    let resp = client()?
        .post(mcp_url(addr))
        .body(tool_call(1, "list_tables", json!({})))
        .send()?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json()?;
    assert_eq!(body["result"]["content"][0]["text"], "No tables found");

    server.shutdown();
    Ok(())
}

#[test]
fn test_public_routes_skip_auth() -> Result<()> {
    let (server, addr) = start_http(Some(KEY), Arc::new(SqliteStore::open_in_memory()?))?;
    let client = client()?;

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()?
        .error_for_status()?
        .json()?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["server"], "cortex");

    let root: Value = client
        .get(format!("http://{}/", addr))
        .send()?
        .error_for_status()?
        .json()?;
    assert_eq!(root["endpoints"]["mcp"], "/mcp");
    assert_eq!(root["endpoints"]["sse"], "/sse");

    server.shutdown();
    Ok(())
}

#[test]
fn test_routing_errors() -> Result<()> {
    let (server, addr) = start_http(None, Arc::new(SqliteStore::open_in_memory()?))?;
    let client = client()?;

    let resp = client.get(format!("http://{}/nope", addr)).send()?;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = client.get(mcp_url(addr)).send()?;
    assert_eq!(resp.status().as_u16(), 405);

    // Query strings do not affect routing
    let resp = client.get(format!("http://{}/health?probe=1", addr)).send()?;
    assert_eq!(resp.status().as_u16(), 200);

    server.shutdown();
    Ok(())
}

#[test]
fn test_malformed_json_and_notifications() -> Result<()> {
    let (server, addr) = start_http(None, Arc::new(SqliteStore::open_in_memory()?))?;
    let client = client()?;

    let resp = client.post(mcp_url(addr)).body("{not json").send()?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json()?;
    assert!(body["error"].is_string());

    let note = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    let resp = client.post(mcp_url(addr)).body(note).send()?;
    assert_eq!(resp.status().as_u16(), 202);

    server.shutdown();
    Ok(())
}

#[test]
fn test_initialize_and_tools_list() -> Result<()> {
    let (server, addr) = start_http(None, Arc::new(SqliteStore::open_in_memory()?))?;
    let client = client()?;

    let init = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let body: Value = client.post(mcp_url(addr)).body(init.to_string()).send()?.json()?;
    assert_eq!(body["result"]["serverInfo"]["name"], "cortex");
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let body: Value = client.post(mcp_url(addr)).body(list.to_string()).send()?.json()?;
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .map(|tools| tools.iter().filter_map(|t| t["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["query", "execute", "list_tables", "schema"]);

    server.shutdown();
    Ok(())
}

/// Read from an SSE stream until `done` says the buffer is complete
fn read_until(stream: &mut TcpStream, done: impl Fn(&str) -> bool) -> Result<String> {
    stream.set_read_timeout(Some(Duration::from_millis(250)))?;
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while Instant::now() < deadline {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => return Err(e.into()),
        }
        if done(&String::from_utf8_lossy(&buf)) {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[test]
fn test_sse_connected_then_pings() -> Result<()> {
    let (server, addr) = start_http(Some(KEY), Arc::new(SqliteStore::open_in_memory()?))?;

    let mut stream = TcpStream::connect(addr)?;
    write!(
        stream,
        "GET /sse HTTP/1.1\r\nHost: {}\r\nx-api-key: {}\r\n\r\n",
        addr, KEY
    )?;
    let text = read_until(&mut stream, |s| s.matches("event: ping").count() >= 2)?;

    assert!(text.starts_with("HTTP/1.1 200"), "got {}", text);
    assert!(text.contains("Content-Type: text/event-stream"));
    let connected = text.find("event: connected").ok_or_else(|| anyhow::anyhow!("no connected event"))?;
    let first_ping = text.find("event: ping").ok_or_else(|| anyhow::anyhow!("no ping event"))?;
    assert!(connected < first_ping);
    assert!(text.contains("data: {\"status\":\"Cortex MCP Server connected\"}"));
    assert!(text.contains("data: {\"status\":\"alive\"}"));

    server.shutdown();
    Ok(())
}

#[test]
fn test_sse_requires_key() -> Result<()> {
    let (server, addr) = start_http(Some(KEY), Arc::new(SqliteStore::open_in_memory()?))?;

    let mut stream = TcpStream::connect(addr)?;
    write!(stream, "GET /sse HTTP/1.1\r\nHost: {}\r\n\r\n", addr)?;
    let text = read_until(&mut stream, |s| s.contains("}"))?;
    assert!(text.starts_with("HTTP/1.1 401"), "got {}", text);
    assert!(!text.contains("event: connected"));

    server.shutdown();
    Ok(())
}
