//! Database connection and schema setup
use anyhow::Result;
use tokio_rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversation (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversation(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    model TEXT,
    is_error INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_message_conversation_id ON message(conversation_id);
"#;

/// Open the async connection used across the app. Foreign keys are
/// enabled per connection so conversation deletes cascade to messages.
pub async fn async_db(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(format!("{}/chat.db", db_path)).await?;
    conn.call(|conn| {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    })
    .await?;
    Ok(conn)
}

/// Create tables if they don't already exist. Safe to run on every boot.
pub fn initialize_db(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
