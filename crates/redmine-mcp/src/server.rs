//! MCP server implementation.
//!
//! The server handles the MCP protocol lifecycle:
//! 1. Initialize - exchange capabilities
//! 2. Handle tool calls - dispatch to the tool registry
//! 3. Shutdown - end of input on stdio, or the SSE stream closing
//!
//! A [`Session`] carries per-connection state; stdio has exactly one,
//! the SSE transport creates one per stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use redmine_client::RedmineClient;
use redmine_core::{Error, RedmineConfig, Result, SharedApi};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::protocol::{
    IncomingMessage, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, RequestId, ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
    ToolsListResult, MCP_VERSION, SERVER_NAME,
};
use crate::tools::{redmine_tools, ToolRegistry};
use crate::transport::{MessageReader, MessageWriter};

/// Responses buffered between request tasks and the stdout writer.
const RESPONSE_BUFFER: usize = 64;

/// MCP server for Redmine.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Build the client once and register every tool against it.
    pub fn from_config(config: &RedmineConfig) -> Result<Self> {
        let api: SharedApi = Arc::new(RedmineClient::new(config)?);
        Ok(Self::new(redmine_tools(api)?))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Start a new protocol session sharing this server's tools.
    pub fn session(&self) -> Arc<Session> {
        Arc::new(Session::new(Arc::clone(&self.registry)))
    }

    /// Serve one session over stdin/stdout until end of input.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve_lines(MessageReader::stdin(), MessageWriter::stdout())
            .await
    }

    /// Serve one session over a line transport.
    ///
    /// Each request runs in its own task; a single writer task serializes
    /// the responses, which may therefore arrive out of request order.
    pub async fn serve_lines<R, W>(
        &self,
        mut reader: MessageReader<R>,
        mut writer: MessageWriter<W>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!("Starting MCP server with {} tools", self.registry.len());

        let session = self.session();
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_BUFFER);

        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.write_response(&response).await {
                    tracing::error!("Failed to write response: {}", e);
                    return Err(e);
                }
            }
            Ok(())
        });

        let outcome = loop {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("EOF received, shutting down");
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!("Transport error: {}", e);
                    break Err(Error::Io(e));
                }
            };

            match IncomingMessage::parse(&line) {
                Ok(IncomingMessage::Request(req)) => {
                    let session = Arc::clone(&session);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let response = session.handle_request(req).await;
                        // Writer gone means the output is closed; nothing left to do.
                        let _ = tx.send(response).await;
                    });
                }
                Ok(IncomingMessage::Notification(notif)) => {
                    session.handle_notification(&notif.method);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse message: {}", e);
                    let response = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(&e.to_string()),
                    );
                    if tx.send(response).await.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        // In-flight requests hold their own senders; the writer drains them.
        drop(tx);
        writer_task.await.map_err(|e| Error::Other(e.into()))??;

        tracing::info!("MCP server stopped");
        outcome
    }
}

/// Protocol state of one client connection.
pub struct Session {
    registry: Arc<ToolRegistry>,
    initialized: AtomicBool,
}

impl Session {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Handle an incoming message. Notifications never get a response.
    pub async fn handle_message(&self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(&notif.method);
                None
            }
        }
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Handling request: {} (id: {:?})", req.method, req.id);

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id, req.params),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            "ping" => self.handle_ping(req.id),
            method => {
                tracing::warn!("Unknown method: {}", method);
                JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(method))
            }
        }
    }

    pub fn handle_notification(&self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => {
                tracing::info!("Client initialized");
            }
            "notifications/cancelled" => {
                tracing::debug!("Request cancelled by client");
            }
            _ => {
                tracing::debug!("Ignoring notification: {}", method);
            }
        }
    }

    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Server already initialized"),
            );
        }

        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init) => tracing::info!(
                    "Client: {} v{} (protocol: {})",
                    init.client_info.name,
                    init.client_info.version,
                    init.protocol_version
                ),
                Err(e) => tracing::warn!("Failed to parse initialize params: {}", e),
            }
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        JsonRpcResponse::from_serializable(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.registry.definitions(),
        };
        JsonRpcResponse::from_serializable(id, &result)
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, JsonRpcError::invalid_params(&e.to_string()));
                }
            },
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        tracing::info!("Calling tool: {}", params.name);

        let result = self.registry.execute(&params.name, params.arguments).await;
        JsonRpcResponse::from_serializable(id, &result)
    }

    fn handle_ping(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({}))
    }
}
