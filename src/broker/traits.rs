//! Trait abstractions for the durable logs

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One entry handed to a consumer by its group
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEntry {
    /// Log position, used to acknowledge the entry
    pub id: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, higher on redelivery
    pub delivery_count: u64,
}

/// Append side of a durable log
#[async_trait]
pub trait RequestLog: Send + Sync {
    /// Append one payload and return the id the log assigned to it.
    /// Resolves only once the log has durably stored the entry.
    async fn append(&self, payload: Vec<u8>) -> Result<String>;
}

/// One member's view of a consumer group.
///
/// The group position only moves on `ack`. An entry that was read but never
/// acknowledged (the process died, or a test simply stops there) goes back to
/// the group and is handed to some member again.
#[async_trait]
pub trait ResultCursor: Send + Sync {
    /// Identity of this member inside the group
    fn consumer_name(&self) -> &str;

    /// Wait up to `timeout` for the next unread entry. `Ok(None)` is an empty poll.
    async fn read(&self, timeout: Duration) -> Result<Option<InboundEntry>>;

    /// Confirm that the entry reached a terminal outcome
    async fn ack(&self, entry_id: &str) -> Result<()>;

    /// Give a read entry back to the group without acknowledging it.
    /// Some member receives it again once `retry_after` has passed.
    async fn release(&self, entry_id: &str, retry_after: Duration) -> Result<()>;
}
