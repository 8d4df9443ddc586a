//! Redmine REST API client for redmine-mcp.
//!
//! Wraps the four HTTP verbs against a configured base URL, attaching the
//! `X-Redmine-API-Key` credential to every request and passing JSON bodies
//! through untouched.

mod client;

pub use client::{RedmineClient, API_KEY_HEADER};
