//! Chat transport abstraction

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A text message received from a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    /// Where replies go
    pub conversation_id: i64,
    /// Who wrote the message
    pub sender_id: i64,
    pub text: String,
}

impl CommandEvent {
    /// Command name without the leading `/` or a trailing `@botname`.
    ///
    /// `"/reschedule@shift_bot now"` → `Some("reschedule")`; plain text → `None`.
    pub fn command(&self) -> Option<&str> {
        let first = self.text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        (!name.is_empty()).then_some(name)
    }

    /// Everything after the command token, trimmed
    pub fn arguments(&self) -> &str {
        let text = self.text.trim();
        if self.command().is_none() {
            return text;
        }
        text.split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("")
    }
}

/// A messaging platform the relay talks through
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Send plain text to a conversation
    async fn send(&self, conversation_id: i64, text: &str) -> Result<()>;

    /// Receive incoming messages until the receiver is dropped (long-running)
    async fn listen(&self, tx: mpsc::Sender<CommandEvent>) -> Result<()>;
}
