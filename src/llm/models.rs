//! Supported model catalog
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ModelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub max_tokens: u32,
    pub context_window: u32,
    pub supports_thinking: bool,
    pub description: &'static str,
}

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub const SUPPORTED_MODELS: &[ModelSpec] = &[
    ModelSpec {
        id: "claude-sonnet-4-20250514",
        name: "Claude 4 Sonnet",
        max_tokens: 64000,
        context_window: 200000,
        supports_thinking: true,
        description: "High-performance model with exceptional reasoning capabilities",
    },
    ModelSpec {
        id: "claude-opus-4-20250514",
        name: "Claude 4 Opus",
        max_tokens: 32000,
        context_window: 200000,
        supports_thinking: true,
        description: "Our most capable and intelligent model yet",
    },
];

/// Look up a model, falling back to the default spec for unknown ids.
pub fn find_model(id: &str) -> &'static ModelSpec {
    SUPPORTED_MODELS
        .iter()
        .find(|m| m.id == id)
        .unwrap_or(&SUPPORTED_MODELS[0])
}
