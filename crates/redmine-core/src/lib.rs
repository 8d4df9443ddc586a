//! Core traits, configuration, and error handling for redmine-mcp.
//!
//! This crate provides the foundational abstractions shared by the HTTP
//! client, the MCP server, and the command-line entry point.

pub mod api;
pub mod config;
pub mod error;

pub use api::{JsonMap, RedmineApi, SharedApi};
pub use config::{Config, RedmineConfig, ServerConfig, Transport};
pub use error::{Error, Result};
