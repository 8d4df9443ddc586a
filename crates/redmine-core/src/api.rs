//! Transport trait for the Redmine REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// JSON object used for query parameters and request bodies.
pub type JsonMap = serde_json::Map<String, Value>;

/// Shared handle to a transport, cloned into every tool handler.
pub type SharedApi = Arc<dyn RedmineApi>;

/// The four HTTP verbs used against a Redmine instance.
///
/// Paths are relative to the configured base URL (e.g. `/issues.json`).
/// Any non-success status surfaces as [`crate::Error::Api`].
#[async_trait]
pub trait RedmineApi: Send + Sync {
    /// GET `path` with optional query parameters; returns the parsed body.
    async fn get(&self, path: &str, params: Option<&JsonMap>) -> Result<Value>;

    /// POST `body` to `path`; returns the parsed body, or `{}` on 204.
    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value>;

    /// PUT `body` to `path`; always returns `{}` on success.
    async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value>;

    /// DELETE `path`; always returns `{}` on success.
    async fn delete(&self, path: &str) -> Result<Value>;
}
