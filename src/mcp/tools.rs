//! Tool catalogue and decoded tool calls

use serde::Serialize;
use serde_json::{json, Map, Value};

/// A tool advertised through `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// The four tools this server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Query,
    Execute,
    ListTables,
    Schema,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Query,
        ToolKind::Execute,
        ToolKind::ListTables,
        ToolKind::Schema,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Execute => "execute",
            Self::ListTables => "list_tables",
            Self::Schema => "schema",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn descriptor(self) -> ToolDescriptor {
        match self {
            Self::Query => ToolDescriptor {
                name: self.name(),
                description: "Run a SELECT query and return the matching rows",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "sql": {
                            "type": "string",
                            "description": "SELECT SQL statement"
                        }
                    },
                    "required": ["sql"]
                }),
            },
            Self::Execute => ToolDescriptor {
                name: self.name(),
                description: "Execute INSERT, UPDATE, DELETE or CREATE statements",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "sql": {
                            "type": "string",
                            "description": "SQL statement to execute"
                        }
                    },
                    "required": ["sql"]
                }),
            },
            Self::ListTables => ToolDescriptor {
                name: self.name(),
                description: "List all tables in the database",
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
            Self::Schema => ToolDescriptor {
                name: self.name(),
                description: "Get the column layout of one table, or the CREATE statement of every table",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "table": {
                            "type": "string",
                            "description": "Table name (optional)"
                        }
                    }
                }),
            },
        }
    }
}

/// Fixed tool catalogue, in advertised order
pub fn list_tools() -> Vec<ToolDescriptor> {
    ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect()
}

/// A tool call with its arguments interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Query { sql: String },
    Execute { sql: String },
    ListTables,
    Schema { table: Option<String> },
    Unrecognized(String),
}

impl ToolCall {
    /// Decode a `(name, arguments)` pair.
    ///
    /// Unknown names are not an error: they become `Unrecognized` so the
    /// dispatcher can answer with text. A missing required argument is.
    pub fn parse(name: &str, arguments: &Map<String, Value>) -> Result<Self, String> {
        let Some(kind) = ToolKind::from_name(name) else {
            return Ok(Self::Unrecognized(name.to_string()));
        };

        let call = match kind {
            ToolKind::Query => Self::Query {
                sql: required_str(arguments, "sql")?,
            },
            ToolKind::Execute => Self::Execute {
                sql: required_str(arguments, "sql")?,
            },
            ToolKind::ListTables => Self::ListTables,
            ToolKind::Schema => Self::Schema {
                table: arguments
                    .get("table")
                    .and_then(|v| v.as_str())
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            },
        };
        Ok(call)
    }
}

fn required_str(arguments: &Map<String, Value>, key: &str) -> Result<String, String> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| format!("missing required argument: {}", key))
}
