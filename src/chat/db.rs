//! Durable conversation history. This module is the single source of
//! truth for transcripts: messages are only ever appended, and the order
//! they are read back in is the order they were committed.
use anyhow::{Error, Result};
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, params};
use uuid::Uuid;

use super::models::{ChatMessage, Conversation, Role};

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .expect("Malformed timestamp in database")
}

pub async fn create_conversation(db: &Connection, title: &str) -> Result<Conversation, Error> {
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        created_at: now,
        updated_at: now,
    };
    let row = conversation.clone();
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO conversation (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            row.id,
            row.title,
            row.created_at.to_rfc3339(),
            row.updated_at.to_rfc3339()
        ])?;
        Ok(())
    })
    .await?;

    Ok(conversation)
}

/// Insert a conversation record if it doesn't already exist. Used by the
/// chat surfaces so a first message can create its conversation implicitly.
pub async fn get_or_create_conversation(db: &Connection, id: &str) -> Result<(), Error> {
    let id = id.to_owned();
    let now = Utc::now().to_rfc3339();
    db.call(move |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO conversation (id, title, created_at, updated_at)
             VALUES (?1, 'New Chat', ?2, ?2)",
            params![id, now],
        )?;
        Ok(())
    })
    .await?;

    Ok(())
}

pub async fn find_conversation_by_id(
    db: &Connection,
    id: &str,
) -> Result<Option<Conversation>, Error> {
    let id = id.to_owned();
    let rows = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM conversation WHERE id = ?1",
            )?;
            let rows = stmt
                .query_map([id], |row| {
                    let created_at: String = row.get(2)?;
                    let updated_at: String = row.get(3)?;
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: parse_ts(&created_at),
                        updated_at: parse_ts(&updated_at),
                    })
                })?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            Ok(rows)
        })
        .await?;

    Ok(rows.into_iter().next())
}

pub async fn list_conversations(db: &Connection) -> Result<Vec<Conversation>, Error> {
    let rows = db
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM conversation
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let created_at: String = row.get(2)?;
                    let updated_at: String = row.get(3)?;
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: parse_ts(&created_at),
                        updated_at: parse_ts(&updated_at),
                    })
                })?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            Ok(rows)
        })
        .await?;

    Ok(rows)
}

/// Case-insensitive substring search over conversation titles and message
/// content. A conversation matches at most once regardless of how many of
/// its messages match.
pub async fn search_conversations(
    db: &Connection,
    query: &str,
) -> Result<Vec<Conversation>, Error> {
    let pattern = format!("%{}%", query.trim().to_lowercase());
    let rows = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT DISTINCT c.id, c.title, c.created_at, c.updated_at
                FROM conversation c
                LEFT JOIN message m ON m.conversation_id = c.id
                WHERE lower(c.title) LIKE ?1 OR lower(m.content) LIKE ?1
                ORDER BY c.updated_at DESC
                "#,
            )?;
            let rows = stmt
                .query_map([pattern], |row| {
                    let created_at: String = row.get(2)?;
                    let updated_at: String = row.get(3)?;
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: parse_ts(&created_at),
                        updated_at: parse_ts(&updated_at),
                    })
                })?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            Ok(rows)
        })
        .await?;

    Ok(rows)
}

/// Delete a conversation and its messages. Returns the number of
/// conversation rows removed (0 when the id doesn't exist).
pub async fn delete_conversation(db: &Connection, id: &str) -> Result<usize, Error> {
    let id = id.to_owned();
    let affected = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM message WHERE conversation_id = ?1", [&id])?;
            let affected = tx.execute("DELETE FROM conversation WHERE id = ?1", [&id])?;
            tx.commit()?;
            Ok(affected)
        })
        .await?;

    Ok(affected)
}

/// Update a conversation title. The recency timestamp is left alone: only
/// appending a message moves a conversation up the list.
pub async fn rename_conversation(
    db: &Connection,
    id: &str,
    title: &str,
) -> Result<usize, Error> {
    let id = id.to_owned();
    let title = title.to_owned();
    let affected = db
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE conversation SET title = ?1 WHERE id = ?2",
                params![title, id],
            )?;
            Ok(affected)
        })
        .await?;

    Ok(affected)
}

/// Append a message. The insert and the conversation recency bump commit
/// together or not at all.
pub async fn insert_message(
    db: &Connection,
    conversation_id: &str,
    role: Role,
    content: &str,
    model: Option<&str>,
) -> Result<ChatMessage, Error> {
    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        role,
        content: content.to_string(),
        model: model.map(str::to_string),
        is_error: false,
        created_at: Utc::now(),
    };
    let row = message.clone();
    db.call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO message (id, conversation_id, role, content, model, is_error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.conversation_id,
                row.role.as_str(),
                row.content,
                row.model,
                row.is_error,
                row.created_at.to_rfc3339()
            ],
        )?;
        tx.execute(
            "UPDATE conversation SET updated_at = ?1 WHERE id = ?2",
            params![row.created_at.to_rfc3339(), row.conversation_id],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await?;

    Ok(message)
}

pub async fn list_messages(
    db: &Connection,
    conversation_id: &str,
) -> Result<Vec<ChatMessage>, Error> {
    let conversation_id = conversation_id.to_owned();
    let rows = db
        .call(move |conn| {
            // rowid follows insert order even when timestamps collide
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, model, is_error, created_at
                 FROM message WHERE conversation_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    let role: String = row.get(2)?;
                    let created_at: String = row.get(6)?;
                    Ok(ChatMessage {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        role: Role::parse(&role).expect("Unknown role in database"),
                        content: row.get(3)?,
                        model: row.get(4)?,
                        is_error: row.get(5)?,
                        created_at: parse_ts(&created_at),
                    })
                })?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            Ok(rows)
        })
        .await?;

    Ok(rows)
}

pub async fn message_count(db: &Connection, conversation_id: &str) -> Result<i64, Error> {
    let conversation_id = conversation_id.to_owned();
    let count = db
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT COUNT(*) FROM message WHERE conversation_id = ?1")?;
            let count: i64 = stmt.query_row([conversation_id], |row| row.get(0))?;
            Ok(count)
        })
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{async_db, initialize_db};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();
        db.call(|conn| {
            initialize_db(conn).unwrap();
            Ok(())
        })
        .await
        .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn it_round_trips_messages_in_append_order() {
        let (_dir, db) = test_db().await;
        let conversation = create_conversation(&db, "Ordering").await.unwrap();

        for i in 0..5 {
            let role = if i % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            insert_message(&db, &conversation.id, role, &format!("message {}", i), None)
                .await
                .unwrap();
        }

        let messages = list_messages(&db, &conversation.id).await.unwrap();
        assert_eq!(messages.len(), 5);
        for (i, message) in messages.iter().enumerate() {
            assert_eq!(message.content, format!("message {}", i));
        }
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn it_orders_conversations_by_recency() {
        let (_dir, db) = test_db().await;
        let first = create_conversation(&db, "First").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = create_conversation(&db, "Second").await.unwrap();

        let listed = list_conversations(&db).await.unwrap();
        assert_eq!(listed[0].id, second.id);

        // Appending to the older conversation moves it back to the top
        tokio::time::sleep(Duration::from_millis(5)).await;
        insert_message(&db, &first.id, Role::User, "bump", None)
            .await
            .unwrap();
        let listed = list_conversations(&db).await.unwrap();
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn appending_refreshes_updated_at() {
        let (_dir, db) = test_db().await;
        let conversation = create_conversation(&db, "Timestamps").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        insert_message(&db, &conversation.id, Role::User, "hello", None)
            .await
            .unwrap();

        let found = find_conversation_by_id(&db, &conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(found.updated_at > conversation.updated_at);
    }

    #[tokio::test]
    async fn renaming_does_not_refresh_updated_at() {
        let (_dir, db) = test_db().await;
        let conversation = create_conversation(&db, "Before").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let affected = rename_conversation(&db, &conversation.id, "After")
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let found = find_conversation_by_id(&db, &conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "After");
        assert_eq!(found.updated_at, conversation.updated_at);
    }

    #[tokio::test]
    async fn it_deletes_conversations_and_their_messages() {
        let (_dir, db) = test_db().await;
        let conversation = create_conversation(&db, "Doomed").await.unwrap();
        insert_message(&db, &conversation.id, Role::User, "hello", None)
            .await
            .unwrap();

        let affected = delete_conversation(&db, &conversation.id).await.unwrap();
        assert_eq!(affected, 1);
        assert!(
            find_conversation_by_id(&db, &conversation.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(list_messages(&db, &conversation.id).await.unwrap().is_empty());
        assert_eq!(message_count(&db, &conversation.id).await.unwrap(), 0);

        // Deleting again is a no-op
        let affected = delete_conversation(&db, &conversation.id).await.unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn it_searches_titles_and_content_case_insensitively() {
        let (_dir, db) = test_db().await;
        let by_title = create_conversation(&db, "Rust borrow checker").await.unwrap();
        let by_content = create_conversation(&db, "Cooking").await.unwrap();
        let unrelated = create_conversation(&db, "Gardening").await.unwrap();
        insert_message(&db, &by_content.id, Role::User, "I love Rust programming", None)
            .await
            .unwrap();
        // A second matching message must not produce a duplicate hit
        insert_message(&db, &by_content.id, Role::Assistant, "Rust is great", None)
            .await
            .unwrap();

        let hits = search_conversations(&db, "RUST").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert!(ids.contains(&by_title.id.as_str()));
        assert!(ids.contains(&by_content.id.as_str()));
        assert!(!ids.contains(&unrelated.id.as_str()));
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (_dir, db) = test_db().await;
        get_or_create_conversation(&db, "fixed-id").await.unwrap();
        get_or_create_conversation(&db, "fixed-id").await.unwrap();

        let listed = list_conversations(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "fixed-id");
        assert_eq!(listed[0].title, "New Chat");
    }
}
