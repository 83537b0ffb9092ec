use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::turn::ConversationRegistry;

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    // Busy-set for turn admission control, shared by every chat surface
    pub registry: Arc<ConversationRegistry>,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig) -> Self {
        Self {
            db,
            config,
            registry: Arc::new(ConversationRegistry::new()),
        }
    }
}
