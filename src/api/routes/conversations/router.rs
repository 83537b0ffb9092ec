//! Router for the conversation management API. Thin pass-throughs to the
//! store, with input validation only.

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tokio_rusqlite::Connection;

use super::public;
use crate::api::state::AppState;
use crate::chat::db::{
    create_conversation, delete_conversation, find_conversation_by_id, list_conversations,
    list_messages, rename_conversation, search_conversations,
};
use crate::turn::title::generate_and_set_title;

type SharedState = Arc<RwLock<AppState>>;

fn db_handle(state: &SharedState) -> Connection {
    state
        .read()
        .expect("Unable to read shared state")
        .db
        .clone()
}

/// Create a new conversation with an explicit title
async fn create(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::CreateConversationRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let db = db_handle(&state);

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Ok(
            (StatusCode::BAD_REQUEST, "Title must not be empty".to_string()).into_response(),
        );
    }

    let conversation = create_conversation(&db, &title).await?;
    Ok(axum::Json(conversation).into_response())
}

/// List all conversations, most recently active first
async fn list(
    State(state): State<SharedState>,
) -> Result<axum::Json<public::ConversationsResponse>, crate::api::public::ApiError> {
    let db = db_handle(&state);
    let conversations = list_conversations(&db).await?;
    Ok(axum::Json(public::ConversationsResponse { conversations }))
}

/// Search conversations by title and message content
async fn search(
    State(state): State<SharedState>,
    Query(params): Query<public::SearchQuery>,
) -> Result<axum::Json<public::ConversationsResponse>, crate::api::public::ApiError> {
    let db = db_handle(&state);

    // Single characters match almost everything; don't bother
    let query = params.q.trim();
    if query.chars().count() < 2 {
        return Ok(axum::Json(public::ConversationsResponse {
            conversations: vec![],
        }));
    }

    let conversations = search_conversations(&db, query).await?;
    Ok(axum::Json(public::ConversationsResponse { conversations }))
}

/// Get a single conversation with its full message history
async fn detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let db = db_handle(&state);

    let Some(conversation) = find_conversation_by_id(&db, &id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response());
    };
    let messages = list_messages(&db, &id).await?;

    Ok(axum::Json(public::ConversationDetailResponse {
        conversation,
        messages,
    })
    .into_response())
}

/// Delete a conversation and all of its messages
async fn remove(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let db = db_handle(&state);

    let affected = delete_conversation(&db, &id).await?;
    if affected == 0 {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response());
    }

    Ok(axum::Json(json!({"message": "Conversation deleted successfully"})).into_response())
}

/// Update a conversation title
async fn rename(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::RenameConversationRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let db = db_handle(&state);

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Ok(
            (StatusCode::BAD_REQUEST, "Title must not be empty".to_string()).into_response(),
        );
    }

    let affected = rename_conversation(&db, &id, &title).await?;
    if affected == 0 {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response());
    }

    Ok(axum::Json(json!({"message": "Title updated successfully"})).into_response())
}

/// Generate a title from the conversation content on demand
async fn generate_title(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let (db, config) = {
        let shared_state = state.read().expect("Unable to read shared state");
        (shared_state.db.clone(), shared_state.config.clone())
    };

    if find_conversation_by_id(&db, &id).await?.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response());
    }

    let title = generate_and_set_title(&db, &config, &id).await?;
    Ok(axum::Json(public::TitleResponse { title }).into_response())
}

/// Create the conversations router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/search", get(search))
        .route("/{id}", get(detail).delete(remove))
        .route("/{id}/title", put(rename))
        .route("/{id}/generate-title", post(generate_title))
}
