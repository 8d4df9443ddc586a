//! Recording stand-in for the Redmine client used by tool tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redmine_core::{Error, JsonMap, RedmineApi, Result};
use serde_json::Value;

/// One request as the tool issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub params: Option<JsonMap>,
    pub body: Option<Value>,
}

/// Records every call; answers with canned responses or simulated failures.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, u16>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer requests to `path` with `value`.
    pub fn respond(&self, path: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), value);
    }

    /// Fail requests to `path` with `status`.
    pub fn fail(&self, path: &str, status: u16) {
        self.failures.lock().unwrap().insert(path.to_string(), status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Call {
        self.calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no calls recorded")
    }

    fn record(
        &self,
        method: &'static str,
        path: &str,
        params: Option<&JsonMap>,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            params: params.cloned(),
            body: body.cloned(),
        });

        if let Some(status) = self.failures.lock().unwrap().get(path) {
            return Err(Error::from_status(*status, format!("simulated failure for {}", path)));
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| Value::Object(JsonMap::new())))
    }
}

#[async_trait]
impl RedmineApi for FakeApi {
    async fn get(&self, path: &str, params: Option<&JsonMap>) -> Result<Value> {
        self.record("GET", path, params, None)
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.record("POST", path, None, body)
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.record("PUT", path, None, body)
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.record("DELETE", path, None, None)
    }
}
