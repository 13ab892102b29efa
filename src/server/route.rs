use crate::engine::Coordinator;
use crate::model::{
    epoch_ms, CorrectAnswer, Question, QuestionId, QuestionKind, QuestionSettings, SessionId,
    SessionMode,
};
use crate::server::ConnectionHandler;
use crate::storage::SessionStore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Sessions created without an explicit expiry live this long.
const DEFAULT_SESSION_TTL_MS: u64 = 2 * 60 * 60 * 1000;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<dyn SessionStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/sessions", post(create_session))
        .with_state(state)
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| listen(socket, state.coordinator))
}

async fn listen(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = ConnectionHandler::new(coordinator, tx);

    let sender_task = pump_outgoing(rx, ws_sender);
    let receiver_task = pump_incoming(ws_receiver, &handler);

    tokio::select! {
        _ = sender_task => {
            info!(connection_id = %handler.connection_id(), "sender task completed");
        }
        _ = receiver_task => {
            info!(connection_id = %handler.connection_id(), "receiver task completed");
        }
    }
    handler.disconnect().await;
}

async fn pump_outgoing(
    mut rx: mpsc::UnboundedReceiver<crate::model::ServerEvent>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(event) = rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "failed to serialize event");
                continue;
            }
        };
        if let Err(err) = ws_sender.send(Message::Text(text)).await {
            error!(%err, "failed to send message");
            break;
        }
    }
}

async fn pump_incoming(mut receiver: SplitStream<WebSocket>, handler: &ConnectionHandler) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(request) => handler.handle_request(request).await,
                Err(err) => {
                    warn!(%err, "failed to parse request");
                    handler.reject_malformed();
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "failed to receive message");
                break;
            }
        }
    }
}

// ===== Session authoring =====

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub mode: SessionMode,
    #[serde(default)]
    pub expires_in_ms: Option<u64>,
    #[serde(default)]
    pub questions: Vec<NewQuestionRequest>,
}

#[derive(Debug, Deserialize)]
pub struct NewQuestionRequest {
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub settings: QuestionSettings,
    #[serde(default)]
    pub answer: Option<CorrectAnswer>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub code: String,
    pub question_ids: Vec<QuestionId>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), (StatusCode, String)> {
    let expires_at = epoch_ms() + request.expires_in_ms.unwrap_or(DEFAULT_SESSION_TTL_MS);
    let session = state
        .store
        .create_session(request.mode, expires_at)
        .await
        .map_err(internal_error)?;

    let mut question_ids = Vec::with_capacity(request.questions.len());
    for (position, new_question) in request.questions.into_iter().enumerate() {
        let mut question = Question::new(
            session.id,
            new_question.kind,
            new_question.prompt,
            position as u32,
        )
        .with_settings(new_question.settings);
        question.options = new_question.options;
        question.answer = new_question.answer;
        question.time_limit_ms = new_question.time_limit_ms;

        let stored = state
            .store
            .add_question(question)
            .await
            .map_err(internal_error)?;
        question_ids.push(stored.id);
    }

    info!(session_id = %session.id, code = %session.code, "session created");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            code: session.code,
            question_ids,
        }),
    ))
}

fn internal_error(err: crate::storage::StorageError) -> (StatusCode, String) {
    error!(%err, "storage failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "request could not be processed".to_string(),
    )
}
