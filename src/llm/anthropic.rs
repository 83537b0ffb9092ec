use std::time::Duration;

use anyhow::{Error, Result, bail};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::models::find_model;
use super::{GenerationOptions, Message};

const ANTHROPIC_VERSION: &str = "2023-06-01";

fn build_payload(messages: &[Message], options: &GenerationOptions, stream: bool) -> Value {
    let spec = find_model(&options.model);
    let max_tokens = options.max_tokens.unwrap_or(spec.max_tokens);
    let messages: Vec<Value> = messages
        .iter()
        .map(|m| {
            json!({
                "role": m.role,
                "content": [{"type": "text", "text": m.content}],
            })
        })
        .collect();

    let mut payload = json!({
        "model": options.model,
        "max_tokens": max_tokens,
        "temperature": options.temperature,
        "messages": messages,
    });
    if stream {
        payload["stream"] = json!(true);
    }
    if options.enable_thinking && spec.supports_thinking {
        payload["thinking"] = json!({"type": "enabled", "budget_tokens": 2048});
    }
    if options.enable_web_search {
        payload["tools"] = json!([{
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": 5,
        }]);
    }
    payload
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[allow(dead_code)]
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart,

    #[serde(rename = "content_block_start")]
    ContentBlockStart,

    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },

    #[serde(rename = "content_block_stop")]
    ContentBlockStop,

    #[serde(rename = "message_delta")]
    MessageDelta,

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "error")]
    ErrorEvent { error: ApiErrorDetail },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },

    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        #[allow(dead_code)]
        thinking: String,
    },

    #[serde(rename = "signature_delta")]
    SignatureDelta,

    #[serde(rename = "input_json_delta")]
    InputJsonDelta {
        #[allow(dead_code)]
        partial_json: String,
    },
}

/// Single-shot generation: the full transcript in, one terminal text out.
pub async fn generate(
    messages: &[Message],
    options: &GenerationOptions,
    api_hostname: &str,
    api_key: &str,
) -> Result<String, Error> {
    let payload = build_payload(messages, options, false);
    let url = format!("{}/v1/messages", api_hostname.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Generation request failed with status {}: {}", status, body);
    }

    let body: Value = response.json().await?;
    let text = body["content"]
        .as_array()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b["type"] == "text")
                .and_then(|b| b["text"].as_str())
        })
        .ok_or_else(|| anyhow::anyhow!("Response missing text content: {}", body))?;

    Ok(text.to_string())
}

/// Streaming generation. Each time new text arrives the cumulative text so
/// far is sent over `tx`, so receivers always render the latest value
/// instead of stitching deltas. Returns the terminal text.
pub async fn generate_stream(
    tx: mpsc::UnboundedSender<String>,
    messages: &[Message],
    options: &GenerationOptions,
    api_hostname: &str,
    api_key: &str,
) -> Result<String, Error> {
    let payload = build_payload(messages, options, true);
    let url = format!("{}/v1/messages", api_hostname.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Generation request failed with status {}: {}", status, body);
    }

    let mut stream = response.bytes_stream();

    let mut content_buf = String::new();
    let mut buffer = String::new();

    'outer: while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk_str = std::str::from_utf8(&chunk)?;

        // Append new data to buffer. This is necessary to handle SSE
        // fragmentation over HTTP/2 frames.
        buffer.push_str(chunk_str);

        // Process all complete SSE events from the buffer
        while let Some(event_end) = buffer.find("\n\n") {
            let event_data = buffer[..event_end].to_string();
            buffer = buffer[event_end + 2..].to_string();

            // The `event:` line is redundant with the tagged `data:`
            // payload, so only the latter is parsed
            let Some(data) = event_data
                .lines()
                .find_map(|line| line.strip_prefix("data: "))
            else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }

            let event = serde_json::from_str::<StreamEvent>(data).inspect_err(|e| {
                tracing::error!("Parsing stream event failed for {}\nError:{}", data, e)
            })?;

            match event {
                StreamEvent::ContentBlockDelta {
                    delta: Delta::TextDelta { text },
                } => {
                    content_buf.push_str(&text);
                    // Ignore send failures: the receiver may be gone but
                    // the generation still has to run to its terminal state
                    let _ = tx.send(content_buf.clone());
                }
                // Thinking and tool-input deltas are not relayed
                StreamEvent::ContentBlockDelta { .. } => {}
                StreamEvent::ErrorEvent { error } => {
                    bail!("Upstream returned an error event: {}", error.message);
                }
                StreamEvent::MessageStop => {
                    break 'outer;
                }
                _ => {}
            }
        }
    }

    if content_buf.is_empty() {
        bail!("Generation stream ended without any text content");
    }

    Ok(content_buf)
}
