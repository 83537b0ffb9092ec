//! Public types for the conversation management API
use serde::{Deserialize, Serialize};

use crate::chat::models::{ChatMessage, Conversation};

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Serialize)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct TitleResponse {
    pub title: String,
}
