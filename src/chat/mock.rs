//! In-memory chat transport for testing without Telegram.

use super::traits::{ChatTransport, CommandEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};

/// Records every sent message; replays queued events from `listen`.
pub struct MockTransport {
    sent: Mutex<Vec<(i64, String)>>,
    incoming: Mutex<Vec<CommandEvent>>,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            incoming: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Queue a text message that `listen` will deliver
    pub async fn queue_message(&self, conversation_id: i64, text: &str) {
        self.incoming.lock().await.push(CommandEvent {
            conversation_id,
            sender_id: conversation_id,
            text: text.to_string(),
        });
    }

    /// Messages sent so far, in order
    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }

    /// Messages sent to one conversation
    pub async fn sent_to(&self, conversation_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == conversation_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, conversation_id: i64, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("mock transport: send refused"));
        }
        self.sent.lock().await.push((conversation_id, text.to_string()));
        Ok(())
    }

    /// Delivers the queued events, then returns
    async fn listen(&self, tx: mpsc::Sender<CommandEvent>) -> Result<()> {
        let events: Vec<CommandEvent> = self.incoming.lock().await.drain(..).collect();
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
