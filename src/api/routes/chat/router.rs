//! Router for the chat API: the streaming WebSocket session and the
//! non-streaming fallback, both backed by the same turn coordinator.

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use super::public;
use crate::api::state::AppState;
use crate::chat::db::get_or_create_conversation;
use crate::core::AppConfig;
use crate::llm::GenerationOptions;
use crate::turn::{ConversationRegistry, TurnEvent, TurnRequest, run_turn};

type SharedState = Arc<RwLock<AppState>>;

fn session_parts(state: &SharedState) -> (Connection, Arc<ConversationRegistry>, AppConfig) {
    let shared_state = state.read().expect("Unable to read shared state");
    (
        shared_state.db.clone(),
        Arc::clone(&shared_state.registry),
        shared_state.config.clone(),
    )
}

fn turn_request(payload: public::ChatRequest, config: &AppConfig) -> TurnRequest {
    TurnRequest {
        conversation_id: payload.conversation_id,
        message: payload.message,
        options: GenerationOptions {
            model: payload
                .model
                .unwrap_or_else(|| config.default_model.clone()),
            temperature: payload.temperature.unwrap_or(config.default_temperature),
            max_tokens: None,
            enable_thinking: payload.enable_thinking,
            enable_web_search: payload.enable_web_search,
        },
    }
}

/// Run a turn synchronously and return only the terminal payload.
/// Fragments are produced but not exposed to this caller.
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let (db, registry, config) = session_parts(&state);

    // Validate before the conversation row is (implicitly) created so a
    // rejected request leaves no trace
    if payload.message.trim().is_empty() {
        return Ok(
            (StatusCode::BAD_REQUEST, "Message must not be empty".to_string()).into_response(),
        );
    }

    get_or_create_conversation(&db, &payload.conversation_id).await?;

    let request = turn_request(payload, &config);
    let (tx, _rx) = mpsc::unbounded_channel();
    let message = run_turn(&db, &registry, &config, request, tx).await?;

    Ok(axum::Json(public::ChatResponse {
        message,
        timestamp: Utc::now(),
    })
    .into_response())
}

/// Upgrade to a live chat session
async fn chat_ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let (db, registry, config) = session_parts(&state);
    ws.on_upgrade(move |socket| handle_session(socket, db, registry, config))
}

/// One live session per connected client. Inbound turn requests are
/// processed one at a time in socket order; events for the active turn are
/// forwarded in the order produced, up to and including its terminal
/// event, before the next request is read.
async fn handle_session(
    mut socket: WebSocket,
    db: Connection,
    registry: Arc<ConversationRegistry>,
    config: AppConfig,
) {
    tracing::debug!("Chat session connected");

    while let Some(Ok(inbound)) = socket.recv().await {
        let text = match inbound {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let payload = match serde_json::from_str::<public::ChatRequest>(&text) {
            Ok(payload) => payload,
            Err(e) => {
                let event = TurnEvent::Error {
                    message: format!("Malformed turn request: {}", e),
                };
                if send_event(&mut socket, &event).await.is_err() {
                    return;
                }
                continue;
            }
        };

        if payload.message.trim().is_empty() {
            let event = TurnEvent::Error {
                message: "Message must not be empty".to_string(),
            };
            if send_event(&mut socket, &event).await.is_err() {
                return;
            }
            continue;
        }

        if let Err(e) = get_or_create_conversation(&db, &payload.conversation_id).await {
            tracing::error!("Failed to prepare conversation: {}", e);
            let event = TurnEvent::Error {
                message: "Failed to prepare conversation".to_string(),
            };
            if send_event(&mut socket, &event).await.is_err() {
                return;
            }
            continue;
        }

        let request = turn_request(payload, &config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let db = db.clone();
            let registry = Arc::clone(&registry);
            let config = config.clone();
            // The turn is detached from the socket: a disconnect mid-turn
            // must not stop the durable write or the registry release
            tokio::spawn(async move {
                let _ = run_turn(&db, &registry, &config, request, tx).await;
            });
        }

        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            if send_event(&mut socket, &event).await.is_err() {
                // Client went away; the spawned turn keeps running and the
                // remaining events are discarded
                return;
            }
            if terminal {
                break;
            }
        }
    }

    tracing::debug!("Chat session disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &TurnEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).expect("TurnEvent serialization cannot fail");
    socket.send(WsMessage::Text(payload.into())).await
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/ws", get(chat_ws_handler))
}
