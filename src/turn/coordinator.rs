//! Runs a single turn to its terminal outcome: validate, admit, persist
//! the user message, relay generated fragments, and commit the assistant
//! message exactly once.
use anyhow::Error;
use thiserror::Error as ThisError;
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use crate::chat::db::{find_conversation_by_id, insert_message, list_messages, message_count};
use crate::chat::models::Role;
use crate::core::AppConfig;
use crate::llm::{self, GenerationOptions};
use crate::turn::registry::ConversationRegistry;
use crate::turn::title;
use crate::turn::{TurnEvent, TurnSink};

#[derive(Debug, ThisError)]
pub enum TurnError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("conversation {0} not found")]
    ConversationNotFound(String),

    #[error("a turn is already in progress for conversation {0}")]
    TurnInProgress(String),

    #[error("generation failed: {0}")]
    Upstream(Error),

    #[error("failed to record the conversation: {0}")]
    Store(Error),
}

pub struct TurnRequest {
    pub conversation_id: String,
    pub message: String,
    pub options: GenerationOptions,
}

/// Execute one turn against an existing conversation, pushing events into
/// `tx` as they happen. Every invocation delivers exactly one terminal
/// event (`complete` or `error`) and returns the terminal text on success.
///
/// Rejections (empty message, unknown conversation, turn already in
/// flight) happen before any store mutation. Once admitted, the registry
/// entry is released on every exit path, after the terminal event has been
/// pushed, so a follow-up turn can never observe a stale busy marker nor
/// overtake this turn's terminal event.
pub async fn run_turn(
    db: &Connection,
    registry: &ConversationRegistry,
    config: &AppConfig,
    request: TurnRequest,
    tx: TurnSink,
) -> Result<String, TurnError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return reject(&tx, TurnError::EmptyMessage);
    }

    match find_conversation_by_id(db, &request.conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return reject(
                &tx,
                TurnError::ConversationNotFound(request.conversation_id),
            );
        }
        Err(e) => return reject(&tx, TurnError::Store(e)),
    }

    if !registry.try_acquire(&request.conversation_id) {
        return reject(&tx, TurnError::TurnInProgress(request.conversation_id));
    }

    let outcome = execute_turn(db, config, &request, &message, &tx).await;
    registry.release(&request.conversation_id);

    match outcome {
        Ok(final_text) => {
            maybe_generate_title(db, config, &request.conversation_id).await;
            Ok(final_text)
        }
        Err(e) => {
            tracing::error!(
                "Turn failed for conversation {}: {}",
                request.conversation_id,
                e
            );
            Err(e)
        }
    }
}

fn reject(tx: &TurnSink, err: TurnError) -> Result<String, TurnError> {
    let _ = tx.send(TurnEvent::Error {
        message: err.to_string(),
    });
    Err(err)
}

async fn execute_turn(
    db: &Connection,
    config: &AppConfig,
    request: &TurnRequest,
    message: &str,
    tx: &TurnSink,
) -> Result<String, TurnError> {
    // The user's own message is committed up front so it survives a failed
    // generation
    insert_message(db, &request.conversation_id, Role::User, message, None)
        .await
        .map_err(TurnError::Store)?;

    let transcript = list_messages(db, &request.conversation_id)
        .await
        .map_err(TurnError::Store)?;
    let prompt: Vec<llm::Message> = transcript
        .iter()
        .map(|m| llm::Message::new(m.role.clone(), &m.content))
        .collect();

    // Fragments flow through a dedicated channel so the sink only ever
    // sees TurnEvents. A single FIFO channel preserves generation order.
    let (fragment_tx, mut fragment_rx) = mpsc::unbounded_channel::<String>();
    let sink = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(full_message) = fragment_rx.recv().await {
            let _ = sink.send(TurnEvent::Chunk { full_message });
        }
    });

    let generated = llm::generate_stream(
        fragment_tx,
        &prompt,
        &request.options,
        &config.anthropic_api_hostname,
        &config.anthropic_api_key,
    )
    .await;
    // All fragments are flushed to the sink before the terminal event
    let _ = forward.await;

    let final_text = match generated {
        Ok(text) => text,
        Err(e) => {
            let err = TurnError::Upstream(e);
            let _ = tx.send(TurnEvent::Error {
                message: err.to_string(),
            });
            return Err(err);
        }
    };

    // Exactly one assistant message per successful turn, committed before
    // the completion event goes out
    if let Err(e) = insert_message(
        db,
        &request.conversation_id,
        Role::Assistant,
        &final_text,
        Some(&request.options.model),
    )
    .await
    {
        let err = TurnError::Store(e);
        let _ = tx.send(TurnEvent::Error {
            message: err.to_string(),
        });
        return Err(err);
    }

    let _ = tx.send(TurnEvent::Complete {
        message: final_text.clone(),
    });

    Ok(final_text)
}

/// Kick off title generation once the first exchange is committed. Fire
/// and forget: a slow or failed title must never affect the turn that
/// triggered it.
async fn maybe_generate_title(db: &Connection, config: &AppConfig, conversation_id: &str) {
    match message_count(db, conversation_id).await {
        Ok(2) => {
            let db = db.clone();
            let config = config.clone();
            let conversation_id = conversation_id.to_string();
            tokio::spawn(async move {
                if let Err(e) =
                    title::generate_and_set_title(&db, &config, &conversation_id).await
                {
                    tracing::warn!(
                        "Title generation failed for conversation {}: {}",
                        conversation_id,
                        e
                    );
                }
            });
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Skipping title generation: {}", e),
    }
}
