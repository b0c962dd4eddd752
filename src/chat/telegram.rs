//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for text messages and answers with `sendMessage`.
//! The bot token is part of every URL, so request errors are stripped of their
//! URL before they reach a log line.

use super::traits::{ChatTransport, CommandEvent};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Server-side long-poll duration for `getUpdates`
const LONG_POLL_SECS: u64 = 30;

/// Pause after a failed poll before trying again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Pause after a 409 (another process polls with the same token)
const CONFLICT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    /// Validate the token. Returns the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let data = self.call("getMe", &serde_json::json!({})).await?;
        let username = data
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(username = %username, "Telegram bot authorized");
        Ok(username)
    }

    /// POST a Bot API method and return its `result` field
    async fn call(&self, method: &str, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("Telegram {} request failed: {}", method, e.without_url()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| anyhow!("Telegram {} returned unreadable body: {}", method, e.without_url()))?;

        let ok = data.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !ok {
            let code = data
                .get("error_code")
                .and_then(Value::as_i64)
                .unwrap_or(i64::from(status.as_u16()));
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown Telegram API error");
            bail!(TelegramApiError {
                method: method.to_string(),
                code,
                description: description.to_string(),
            });
        }
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Turn one `getUpdates` element into an event. Non-text updates yield `None`.
    pub(crate) fn parse_update(update: &Value) -> Option<CommandEvent> {
        let message = update.get("message")?;
        let text = message.get("text").and_then(Value::as_str)?;
        let conversation_id = message.get("chat")?.get("id").and_then(Value::as_i64)?;
        let sender_id = message
            .get("from")
            .and_then(|from| from.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(conversation_id);
        Some(CommandEvent {
            conversation_id,
            sender_id,
            text: text.to_string(),
        })
    }
}

/// Error reported by the Bot API itself (as opposed to the network)
#[derive(Debug, thiserror::Error)]
#[error("Telegram {method} failed (code={code}): {description}")]
pub struct TelegramApiError {
    pub method: String,
    pub code: i64,
    pub description: String,
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, conversation_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": conversation_id,
            "text": text,
        });
        self.call("sendMessage", &body).await?;
        debug!(conversation_id, "Telegram message sent");
        Ok(())
    }

    async fn listen(&self, tx: mpsc::Sender<CommandEvent>) -> Result<()> {
        let mut offset: i64 = 0;
        info!("Telegram transport listening for messages...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": LONG_POLL_SECS,
                "allowed_updates": ["message"]
            });

            let updates = match self.call("getUpdates", &body).await {
                Ok(result) => result,
                Err(e) => {
                    let conflict = e
                        .downcast_ref::<TelegramApiError>()
                        .is_some_and(|api| api.code == 409);
                    if conflict {
                        warn!("Telegram polling conflict (409): {}. Ensure only one process polls with this bot token.", e);
                        tokio::time::sleep(CONFLICT_RETRY_DELAY).await;
                    } else {
                        warn!("Telegram poll error: {}", e);
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                    continue;
                }
            };

            let Some(updates) = updates.as_array() else {
                warn!("Telegram getUpdates returned a non-array result: {}", updates);
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            };
            for update in updates {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }
                let Some(event) = Self::parse_update(update) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    debug!("Telegram listener stopping: receiver dropped");
                    return Ok(());
                }
            }
        }
    }
}
