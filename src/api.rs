//! Web server for the ledger agent
//!
//! Serves the chat page and a WebSocket endpoint. Every socket gets its own
//! conversation; all sockets share the process ledger.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::completion::CompletionClient;
use crate::conversation::{Conversation, GENERIC_FAILURE};
use crate::tools::ToolRegistry;

/// =============================
/// Socket Events
/// =============================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "userMessage")]
    UserMessage(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "assistantMessage")]
    AssistantMessage(String),
    #[serde(rename = "error")]
    Error(String),
}

pub fn decode_event(frame: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(frame)
}

pub fn encode_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub client: Arc<dyn CompletionClient>,
    pub registry: Arc<ToolRegistry>,
    pub max_tool_rounds: u32,
}

impl ApiState {
    fn new_conversation(&self) -> Conversation {
        Conversation::new(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            self.max_tool_rounds,
        )
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Socket
/// =============================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| chat_session(socket, state))
}

/// Turn one inbound frame into the reply event.
pub async fn reply_to_frame(conversation: &mut Conversation, frame: &str) -> ServerEvent {
    let utterance = match decode_event(frame) {
        Ok(ClientEvent::UserMessage(text)) => text,
        Err(e) => {
            debug!(session_id = %conversation.session_id(), error = %e, "Unreadable socket frame");
            return ServerEvent::Error(format!("Unrecognized message: {}", e));
        }
    };

    match conversation.respond(&utterance).await {
        Ok(answer) => ServerEvent::AssistantMessage(answer),
        Err(e) => {
            warn!(session_id = %conversation.session_id(), error = %e, "Turn failed");
            ServerEvent::Error(GENERIC_FAILURE.to_string())
        }
    }
}

/// Frames a client may queue while a reply is still being produced.
pub const MAX_PENDING_FRAMES: usize = 8;

const BUSY_MESSAGE: &str = "Still working on an earlier message, please wait.";

enum Inbound {
    Text(String),
    Closed,
    Ignored,
}

/// Text-frame transport a chat session runs over.
#[async_trait]
trait FrameChannel: Send {
    /// Cancel safe: dropping the future loses no frame.
    async fn recv_frame(&mut self) -> Inbound;

    /// Returns false once the peer is gone.
    async fn send_frame(&mut self, payload: String) -> bool;
}

#[async_trait]
impl FrameChannel for WebSocket {
    async fn recv_frame(&mut self) -> Inbound {
        match self.recv().await {
            Some(Ok(WsMessage::Text(text))) => Inbound::Text(text),
            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => Inbound::Closed,
            Some(Ok(_)) => Inbound::Ignored,
        }
    }

    async fn send_frame(&mut self, payload: String) -> bool {
        self.send(WsMessage::Text(payload)).await.is_ok()
    }
}

async fn send_event<C: FrameChannel>(channel: &mut C, event: &ServerEvent) -> bool {
    match encode_event(event) {
        Ok(payload) => channel.send_frame(payload).await,
        Err(e) => {
            warn!(error = %e, "Failed to encode reply");
            true
        }
    }
}

async fn chat_session(socket: WebSocket, state: ApiState) {
    let mut conversation = state.new_conversation();
    let session_id = conversation.session_id();

    info!(%session_id, "Chat session connected");
    run_session(socket, &mut conversation).await;
    info!(%session_id, "Chat session closed");
}

async fn run_session<C: FrameChannel>(mut channel: C, conversation: &mut Conversation) {
    let session_id = conversation.session_id();
    let mut backlog: VecDeque<String> = VecDeque::new();

    'session: loop {
        let frame = match backlog.pop_front() {
            Some(frame) => frame,
            None => match channel.recv_frame().await {
                Inbound::Text(frame) => frame,
                Inbound::Closed => break 'session,
                Inbound::Ignored => continue 'session,
            },
        };

        // Keep reading while the turn runs so a disconnect cancels it.
        let reply = {
            let turn = reply_to_frame(conversation, &frame);
            tokio::pin!(turn);

            loop {
                tokio::select! {
                    event = &mut turn => break event,
                    inbound = channel.recv_frame() => match inbound {
                        Inbound::Text(next) if backlog.len() < MAX_PENDING_FRAMES => {
                            backlog.push_back(next)
                        }
                        Inbound::Text(_) => {
                            debug!(%session_id, pending = backlog.len(), "Backlog full, frame refused");
                            let busy = ServerEvent::Error(BUSY_MESSAGE.to_string());
                            if !send_event(&mut channel, &busy).await {
                                break 'session;
                            }
                        }
                        Inbound::Closed => {
                            info!(%session_id, "Peer left during a turn, cancelling");
                            break 'session;
                        }
                        Inbound::Ignored => {}
                    }
                }
            }
        };

        if !send_event(&mut channel, &reply).await {
            break;
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    static_dir: impl AsRef<Path>,
    port: u16,
) -> crate::Result<()> {
    let router = create_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Server running on port {}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
