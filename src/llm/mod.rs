//! Adapter around the upstream generation API. Callers hand over an
//! ordered transcript and opaque options and get back either a single
//! terminal text or a stream of cumulative fragments followed by one.
mod anthropic;
pub mod models;

pub use anthropic::{generate, generate_stream};

use serde::Serialize;

use crate::chat::models::Role;

#[derive(Clone, Serialize, Debug)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Per-turn generation settings, passed through from the client request.
#[derive(Clone, Debug)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    /// Overrides the model's default output budget when set.
    pub max_tokens: Option<u32>,
    pub enable_thinking: bool,
    pub enable_web_search: bool,
}
