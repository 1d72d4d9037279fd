//! Transport-agnostic request dispatcher
//!
//! Every transport hands decoded messages here. Store failures and unknown
//! tools come back as text content, never as a Rust error, so each
//! transport can show them the same way.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::protocol::{
    Request, Response, ToolResult, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use super::tools::{self, ToolCall};
use crate::binding::ConnectionBinding;
use crate::error::StoreError;
use crate::store::Store;

/// MCP protocol revision answered to `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo` and on the HTTP root
pub const SERVER_NAME: &str = "cortex";

const NO_DATABASE: &str = "Error: No database connected";

pub struct Dispatcher {
    binding: Arc<ConnectionBinding>,
}

impl Dispatcher {
    pub fn new(binding: Arc<ConnectionBinding>) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &Arc<ConnectionBinding> {
        &self.binding
    }

    /// Decode one raw message and dispatch it.
    ///
    /// `Ok(None)` means the message was a notification.
    pub fn handle_message(&self, raw: &str) -> Result<Option<Response>, serde_json::Error> {
        let request: Request = serde_json::from_str(raw)?;
        Ok(self.handle(&request))
    }

    /// Dispatch a decoded request. Notifications produce no response.
    pub fn handle(&self, req: &Request) -> Option<Response> {
        if req.jsonrpc != "2.0" {
            return Some(Response::error(
                req.id.clone(),
                INVALID_REQUEST,
                &format!(
                    "Invalid JSON-RPC version: expected 2.0, got {}",
                    req.jsonrpc
                ),
            ));
        }

        if req.is_notification() {
            debug!(method = %req.method, "notification");
            return None;
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => Response::success(req.id.clone(), json!({})),
            "tools/list" => Response::success(req.id.clone(), json!({ "tools": tools::list_tools() })),
            "tools/call" => self.handle_tool_call(req),
            _ => Response::error(req.id.clone(), METHOD_NOT_FOUND, "Method not found"),
        };
        Some(response)
    }

    fn handle_initialize(&self, req: &Request) -> Response {
        Response::success(
            req.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tool_call(&self, req: &Request) -> Response {
        let Some(name) = req.params.get("name").and_then(|v| v.as_str()) else {
            return Response::error(
                req.id.clone(),
                INVALID_PARAMS,
                "Missing required parameter: name",
            );
        };
        let arguments = req
            .params
            .get("arguments")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let result = self.call_tool(name, &arguments);
        match serde_json::to_value(&result) {
            Ok(value) => Response::success(req.id.clone(), value),
            Err(e) => Response::error(req.id.clone(), INVALID_PARAMS, &e.to_string()),
        }
    }

    /// Run one tool against the bound store. Never fails.
    pub fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult {
        let Some(store) = self.binding.get() else {
            return ToolResult::text(NO_DATABASE);
        };

        let call = match ToolCall::parse(name, arguments) {
            Ok(call) => call,
            Err(msg) => return ToolResult::text(format!("Error: {}", msg)),
        };

        debug!(tool = name, "tool call");
        match run(store.as_ref(), call) {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool failed");
                ToolResult::text(format!("Error: {}", e))
            }
        }
    }
}

fn run(store: &dyn Store, call: ToolCall) -> Result<ToolResult, StoreError> {
    match call {
        ToolCall::Query { sql } => {
            let rows = store.fetch(&sql)?;
            if rows.is_empty() {
                return Ok(ToolResult::text("No results found"));
            }
            Ok(ToolResult::text(join_lines(rows.iter().map(|r| r.to_string()))))
        }
        ToolCall::Execute { sql } => {
            store.execute(&sql)?;
            Ok(ToolResult::text("Executed successfully"))
        }
        ToolCall::ListTables => {
            let rows = store.fetch("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let names: Vec<String> = rows
                .iter()
                .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(String::from))
                .collect();
            if names.is_empty() {
                return Ok(ToolResult::text("No tables found"));
            }
            Ok(ToolResult::text(names.join("\n")))
        }
        ToolCall::Schema { table: Some(table) } => {
            let rows = store.fetch(&format!("PRAGMA table_info({})", quote_ident(&table)))?;
            if rows.is_empty() {
                return Ok(ToolResult::text("No schema found"));
            }
            Ok(ToolResult::text(join_lines(rows.iter().map(|r| r.to_string()))))
        }
        ToolCall::Schema { table: None } => {
            let rows =
                store.fetch("SELECT sql FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let statements: Vec<String> = rows
                .iter()
                .filter_map(|row| row.get("sql").and_then(|v| v.as_str()).map(String::from))
                .collect();
            if statements.is_empty() {
                return Ok(ToolResult::text("No schema found"));
            }
            Ok(ToolResult::text(statements.join("\n")))
        }
        ToolCall::Unrecognized(name) => Ok(ToolResult::text(format!("Unknown tool: {}", name))),
    }
}

fn join_lines(lines: impl Iterator<Item = String>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}

/// Double-quote an identifier for use in SQL text
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
