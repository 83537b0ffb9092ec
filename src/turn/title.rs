//! Best-effort conversation titles, generated from the first exchange.
use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

use crate::chat::db::{list_messages, rename_conversation};
use crate::chat::models::{ChatMessage, Role};
use crate::core::AppConfig;
use crate::llm::{self, GenerationOptions};

/// Summarize the transcript into a short title and store it. Falls back to
/// an excerpt of the first message when the generation call fails, so the
/// conversation always ends up with something better than "New Chat".
pub async fn generate_and_set_title(
    db: &Connection,
    config: &AppConfig,
    conversation_id: &str,
) -> Result<String, Error> {
    let transcript = list_messages(db, conversation_id).await?;
    if transcript.is_empty() {
        return Ok("New Chat".to_string());
    }

    let prompt = title_prompt(&transcript);
    let options = GenerationOptions {
        model: config.default_model.clone(),
        temperature: 0.3,
        max_tokens: Some(20),
        enable_thinking: false,
        enable_web_search: false,
    };
    let request = vec![llm::Message::new(Role::User, &prompt)];

    let title = match llm::generate(
        &request,
        &options,
        &config.anthropic_api_hostname,
        &config.anthropic_api_key,
    )
    .await
    {
        Ok(raw) => {
            let cleaned = clean_title(&raw);
            if cleaned.is_empty() {
                excerpt_title(&transcript[0].content)
            } else {
                cleaned
            }
        }
        Err(e) => {
            tracing::warn!(
                "Falling back to excerpt title for conversation {}: {}",
                conversation_id,
                e
            );
            excerpt_title(&transcript[0].content)
        }
    };

    rename_conversation(db, conversation_id, &title).await?;
    Ok(title)
}

fn title_prompt(transcript: &[ChatMessage]) -> String {
    let mut conversation = String::new();
    for message in transcript.iter().take(5) {
        conversation.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
    }
    // Cap the excerpt so a long first exchange doesn't blow the prompt up
    let excerpt: String = conversation.chars().take(1000).collect();

    format!(
        "Based on this conversation, generate a concise title that captures the main topic. \
         The title should be EXACTLY 4 words or less, no punctuation, just the core topic.\n\n\
         Conversation:\n{}\n\nTitle (4 words max):",
        excerpt
    )
}

fn clean_title(raw: &str) -> String {
    let cleaned = raw.trim().replace(['"', '\''], "");
    cleaned
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

fn excerpt_title(content: &str) -> String {
    if content.chars().count() > 30 {
        format!("{}...", content.chars().take(30).collect::<String>())
    } else {
        content.to_string()
    }
}
