//! Public types for the chat API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound turn request, shared by the WebSocket session and the
/// non-streaming endpoint.
#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub enable_web_search: bool,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_minimal_deserialization() {
        let json = r#"{"message":"Hi","conversation_id":"c1"}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.message, "Hi");
        assert_eq!(request.conversation_id, "c1");
        assert!(request.model.is_none());
        assert!(request.temperature.is_none());
        assert!(!request.enable_thinking);
        assert!(!request.enable_web_search);
    }

    #[test]
    fn test_chat_request_full_deserialization() {
        let json = r#"{
            "message": "Hi",
            "conversation_id": "c1",
            "model": "claude-opus-4-20250514",
            "temperature": 0.7,
            "enable_thinking": true,
            "enable_web_search": true
        }"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.model.as_deref(), Some("claude-opus-4-20250514"));
        assert_eq!(request.temperature, Some(0.7));
        assert!(request.enable_thinking);
        assert!(request.enable_web_search);
    }

    #[test]
    fn test_chat_request_requires_message_and_conversation() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"message":"Hi"}"#).is_err());
        assert!(serde_json::from_str::<ChatRequest>(r#"{"conversation_id":"c1"}"#).is_err());
    }
}
