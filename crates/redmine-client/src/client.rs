//! Redmine API client implementation.

use async_trait::async_trait;
use redmine_core::{Error, JsonMap, RedmineApi, RedmineConfig, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Header carrying the Redmine REST API key.
pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";

/// Redmine API client.
///
/// Holds one pooled `reqwest::Client`; the base URL and key never change
/// after construction, so a single instance is shared by every tool call.
pub struct RedmineClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RedmineClient {
    /// Create a client from resolved connection settings.
    ///
    /// An empty URL or API key is rejected with [`Error::Config`].
    pub fn new(config: &RedmineConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("Redmine URL must not be empty".to_string()));
        }
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("Redmine API key must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent("redmine-mcp")
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    /// Create a client with an explicit base URL and key.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::new(&RedmineConfig {
            url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Base URL with trailing slashes removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build request with the credential and content-type headers.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send a request and turn any non-success status into [`Error::Api`].
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status_code, body = %body, "Redmine API error response");
            return Err(Error::from_status(status_code, body));
        }

        Ok(response)
    }

    async fn parse_json(response: reqwest::Response) -> Result<Value> {
        response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
    }
}

fn empty_object() -> Value {
    Value::Object(JsonMap::new())
}

#[async_trait]
impl RedmineApi for RedmineClient {
    async fn get(&self, path: &str, params: Option<&JsonMap>) -> Result<Value> {
        debug!("Redmine GET {}{}", self.base_url, path);

        let mut builder = self.request(Method::GET, path);
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            builder = builder.query(params);
        }

        let response = self.send(builder).await?;
        Self::parse_json(response).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        debug!("Redmine POST {}{}", self.base_url, path);

        let mut builder = self.request(Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.send(builder).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(empty_object());
        }
        Self::parse_json(response).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        debug!("Redmine PUT {}{}", self.base_url, path);

        let mut builder = self.request(Method::PUT, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        // Redmine answers updates with an empty 204; whatever comes back is dropped.
        self.send(builder).await?;
        Ok(empty_object())
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        debug!("Redmine DELETE {}{}", self.base_url, path);

        self.send(self.request(Method::DELETE, path)).await?;
        Ok(empty_object())
    }
}
