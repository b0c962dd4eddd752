//! Trait abstraction for the correlation store

use crate::envelope::RequesterId;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Request id → requester mapping shared by every relay instance.
///
/// Each operation is atomic on its own; nothing spans more than one key.
/// `delete` is idempotent so a duplicated delivery degrades to a no-op.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Record who issued `request_id`. The entry disappears after `ttl`.
    async fn set(&self, request_id: &str, requester: RequesterId, ttl: Duration) -> Result<()>;

    /// Look up the requester. Expired and unknown ids both yield `None`.
    async fn get(&self, request_id: &str) -> Result<Option<RequesterId>>;

    /// Remove the entry. Deleting a missing key is not an error.
    async fn delete(&self, request_id: &str) -> Result<()>;
}
