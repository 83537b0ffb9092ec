//! One conversation turn: a user message in, an assistant message out,
//! with intermediate output relayed through a transport-agnostic sink.
mod coordinator;
pub mod registry;
pub mod title;

pub use coordinator::{TurnError, TurnRequest, run_turn};
pub use registry::ConversationRegistry;

use serde::Serialize;
use tokio::sync::mpsc;

/// Events produced over the lifetime of a turn. Every turn ends with
/// exactly one terminal event: `complete` or `error`.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// In-progress output. Carries the cumulative text so far rather than
    /// a delta so consumers can always render the latest value.
    Chunk { full_message: String },
    Complete { message: String },
    Error { message: String },
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Chunk { .. })
    }
}

/// Destination for turn events, decoupled from any specific transport.
pub type TurnSink = mpsc::UnboundedSender<TurnEvent>;
