//! MCP (Model Context Protocol) server for Redmine.
//!
//! Every tool maps onto a single Redmine REST endpoint: arguments become a
//! query string or an `issue` envelope, and the JSON response is handed back
//! to the caller unmodified.

pub mod protocol;
pub mod server;
pub mod sse;
pub mod tools;
pub mod transport;

pub use server::McpServer;
pub use tools::{Tool, ToolRegistry};
