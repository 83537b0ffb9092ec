//! Test utilities for integration tests
use std::env;
use std::fs;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use axum::{Router, body::Body};
use tokio_rusqlite::Connection;

use chatd::api::AppState;
use chatd::api::app;
use chatd::core::AppConfig;
use chatd::core::db::{async_db, initialize_db};

#[allow(dead_code)]
pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Creates a test application router backed by a throwaway database. The
/// upstream hostname points at a closed port so an accidental generation
/// call fails fast instead of hitting the network.
#[allow(dead_code)]
pub async fn test_app() -> Router {
    let (app, _db) = test_app_with_db("http://127.0.0.1:1").await;
    app
}

/// Like `test_app` but with a custom upstream hostname (for mockito) and
/// direct access to the underlying database connection.
#[allow(dead_code)]
pub async fn test_app_with_db(api_hostname: &str) -> (Router, Connection) {
    // Unique directory per test app to avoid collisions between tests
    let temp_dir = env::temp_dir();
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string();
    let dir = temp_dir.join(format!("chatd-test-{}", ts));
    let db_path = dir.join("db");
    fs::create_dir_all(&db_path).expect("Failed to create db directory");

    let db = async_db(db_path.to_str().unwrap())
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to initialize db");
        Ok(())
    })
    .await
    .unwrap();

    let app_config = AppConfig {
        db_path: db_path.display().to_string(),
        anthropic_api_hostname: api_hostname.to_string(),
        anthropic_api_key: String::from("test-api-key"),
        default_model: String::from("claude-sonnet-4-20250514"),
        default_temperature: 0.1,
    };
    let app_state = AppState::new(db.clone(), app_config);
    (app(Arc::new(RwLock::new(app_state))), db)
}
