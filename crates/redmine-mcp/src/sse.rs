//! HTTP transport: MCP over Server-Sent Events.
//!
//! A client opens `GET /sse` and receives an `endpoint` event naming the URL
//! to POST its JSON-RPC messages to. Each POST is acknowledged with
//! `202 Accepted`; the JSON-RPC response is delivered later as a `message`
//! event on the client's stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Router,
};
use redmine_core::Result;
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt as _};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{IncomingMessage, JsonRpcResponse};
use crate::server::{McpServer, Session};

/// Path clients POST their messages to.
pub const MESSAGES_PATH: &str = "/messages/";

const SESSION_BUFFER: usize = 64;

type Sessions = Arc<RwLock<HashMap<String, SessionHandle>>>;

/// Live session reachable from `POST /messages/`.
struct SessionHandle {
    session: Arc<Session>,
    tx: mpsc::Sender<JsonRpcResponse>,
}

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    sessions: Sessions,
}

/// Removes its session once the SSE stream holding it is dropped.
struct SessionGuard {
    id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let id = std::mem::take(&mut self.id);
        let sessions = Arc::clone(&self.sessions);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                sessions.write().await.remove(&id);
                debug!(session_id = %id, "SSE session closed");
            });
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

/// Build the SSE router around `server`.
pub fn router(server: Arc<McpServer>) -> Router {
    build_router(AppState {
        server,
        sessions: Arc::default(),
    })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route(MESSAGES_PATH, post(message_handler))
        .route("/messages", post(message_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the SSE transport on `addr` until the listener fails.
pub async fn serve(server: McpServer, addr: &str) -> Result<()> {
    info!("Starting MCP SSE server with {} tools", server.registry().len());

    let router = router(Arc::new(server));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("MCP SSE server listening on http://{}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let id = Uuid::new_v4().simple().to_string();
    let (tx, rx) = mpsc::channel(SESSION_BUFFER);

    state.sessions.write().await.insert(
        id.clone(),
        SessionHandle {
            session: state.server.session(),
            tx,
        },
    );
    debug!(session_id = %id, "SSE session opened");

    let endpoint = SseEvent::default()
        .event("endpoint")
        .data(format!("{}?session_id={}", MESSAGES_PATH, id));

    let guard = SessionGuard {
        id,
        sessions: Arc::clone(&state.sessions),
    };

    let messages = ReceiverStream::new(rx).filter_map(move |response: JsonRpcResponse| {
        let _guard = &guard;
        match SseEvent::default().event("message").json_data(&response) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Failed to encode response: {}", e);
                None
            }
        }
    });

    Sse::new(tokio_stream::once(Ok(endpoint)).chain(messages)).keep_alive(KeepAlive::default())
}

async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "Missing session_id").into_response();
    };

    let handle = state
        .sessions
        .read()
        .await
        .get(&session_id)
        .map(|h| (Arc::clone(&h.session), h.tx.clone()));
    let Some((session, tx)) = handle else {
        debug!(session_id = %session_id, "Message for unknown session");
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    let msg = match IncomingMessage::parse(&body) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return (StatusCode::BAD_REQUEST, format!("Could not parse message: {}", e))
                .into_response();
        }
    };

    tokio::spawn(async move {
        if let Some(response) = session.handle_message(msg).await {
            if tx.send(response).await.is_err() {
                debug!("SSE stream closed before the response was delivered");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
