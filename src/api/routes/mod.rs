//! API routes module

pub mod chat;
pub mod conversations;

use std::sync::{Arc, RwLock};

use axum::{Router, response::IntoResponse, routing::get};
use serde_json::json;

use crate::api::state::AppState;
use crate::llm::models::SUPPORTED_MODELS;

type SharedState = Arc<RwLock<AppState>>;

/// Liveness probe, unrelated to turn logic
async fn health() -> impl IntoResponse {
    axum::Json(json!({"status": "healthy"}))
}

/// The supported model catalog
async fn models() -> impl IntoResponse {
    axum::Json(json!({"models": SUPPORTED_MODELS}))
}

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat routes
        .nest("/chat", chat::router())
        // Conversation management routes
        .nest("/conversations", conversations::router())
        .route("/models", get(models))
        .route("/health", get(health))
}
