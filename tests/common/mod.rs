//! Shared helpers for transport integration tests

#![allow(dead_code)]

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cortex_mcp::error::StoreError;
use cortex_mcp::store::{Row, SqliteStore, Store};
use cortex_mcp::{server, RunningServer, ServerConfig, TransportKind};

/// SQLite store that counts every call reaching it
pub struct RecordingStore {
    inner: SqliteStore,
    calls: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: SqliteStore::open_in_memory()?,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Store for RecordingStore {
    fn execute(&self, sql: &str) -> Result<(), StoreError> {
        self.hit();
        self.inner.execute(sql)
    }

    fn fetch(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        self.hit();
        self.inner.fetch(sql)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Config for a single network transport on an ephemeral loopback port
pub fn config(transport: TransportKind, api_key: Option<&str>) -> ServerConfig {
    ServerConfig {
        transport,
        host: "127.0.0.1".to_string(),
        port: 0,
        api_key: api_key.map(String::from),
        sse_keepalive: Duration::from_millis(100),
    }
}

pub fn start_http(api_key: Option<&str>, store: Arc<dyn Store>) -> Result<(RunningServer, SocketAddr)> {
    let running = server::start(&config(TransportKind::Http, api_key), store)?;
    let addr = running
        .http_addr()
        .ok_or_else(|| anyhow::anyhow!("http transport not started"))?;
    Ok((running, addr))
}

pub fn start_websocket(
    api_key: Option<&str>,
    store: Arc<dyn Store>,
) -> Result<(RunningServer, SocketAddr)> {
    let running = server::start(&config(TransportKind::Websocket, api_key), store)?;
    let addr = running
        .websocket_addr()
        .ok_or_else(|| anyhow::anyhow!("websocket transport not started"))?;
    Ok((running, addr))
}

/// JSON-RPC `tools/call` body
pub fn tool_call(id: u64, name: &str, arguments: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string()
}
