use std::env;

use crate::llm::models::DEFAULT_MODEL;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: String,
    pub anthropic_api_hostname: String,
    pub anthropic_api_key: String,
    pub default_model: String,
    pub default_temperature: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("CHATD_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path);
        let anthropic_api_hostname = env::var("CHATD_ANTHROPIC_HOSTNAME")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        let anthropic_api_key =
            env::var("ANTHROPIC_API_KEY").expect("Missing env var ANTHROPIC_API_KEY");
        let default_model =
            env::var("CHATD_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            db_path,
            anthropic_api_hostname,
            anthropic_api_key,
            default_model,
            default_temperature: 0.1,
        }
    }
}
