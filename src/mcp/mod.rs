//! MCP (Model Context Protocol) core
//!
//! JSON-RPC 2.0 envelope, the fixed tool catalogue and the dispatcher that
//! every transport shares.

mod dispatcher;
pub mod protocol;
pub mod tools;

pub use dispatcher::{Dispatcher, PROTOCOL_VERSION, SERVER_NAME};
pub use protocol::{Content, Request, Response, ToolResult};
pub use tools::{list_tools, ToolCall, ToolDescriptor, ToolKind};
