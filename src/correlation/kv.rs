//! JetStream key/value implementation of the correlation store
//!
//! Values are `CorrelationRecord` JSON documents. The record carries its own
//! deadline so every entry honours the TTL it was written with; the bucket's
//! `max_age` is the backstop that physically drops entries whose result never
//! arrived.

use super::mapping_key;
use super::traits::CorrelationStore;
use crate::envelope::RequesterId;
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stored value for one in-flight request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CorrelationRecord {
    pub requester_id: RequesterId,
    pub expires_at: DateTime<Utc>,
}

impl CorrelationRecord {
    pub fn new(requester_id: RequesterId, ttl: Duration, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .context("correlation TTL out of range")?;
        Ok(Self {
            requester_id,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Correlation store backed by a NATS JetStream KV bucket
#[derive(Clone)]
pub struct KvCorrelationStore {
    kv: kv::Store,
    bucket: String,
}

impl KvCorrelationStore {
    /// Open the bucket, creating it with `max_age` when it does not exist yet.
    pub async fn open(context: &jetstream::Context, bucket: &str, max_age: Duration) -> Result<Self> {
        let kv = match context.get_key_value(bucket).await {
            Ok(kv) => {
                debug!(bucket = %bucket, "Using existing correlation bucket");
                kv
            }
            Err(_) => context
                .create_key_value(kv::Config {
                    bucket: bucket.to_string(),
                    description: "request id -> requester correlation".to_string(),
                    history: 1,
                    max_age,
                    ..Default::default()
                })
                .await
                .map_err(|e| anyhow!("Failed to create correlation bucket {}: {}", bucket, e))?,
        };

        info!(
            bucket = %bucket,
            ttl_secs = max_age.as_secs(),
            "Correlation store ready"
        );
        Ok(Self {
            kv,
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl CorrelationStore for KvCorrelationStore {
    async fn set(&self, request_id: &str, requester: RequesterId, ttl: Duration) -> Result<()> {
        let key = mapping_key(request_id)
            .ok_or_else(|| anyhow!("request id {:?} is not a valid store key", request_id))?;
        let record = CorrelationRecord::new(requester, ttl, Utc::now())?;
        let value = serde_json::to_vec(&record)?;
        self.kv
            .put(key.as_str(), value.into())
            .await
            .map_err(|e| anyhow!("Failed to write correlation {}: {}", key, e))?;
        debug!(request_id = %request_id, requester = %requester, "Correlation stored");
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<Option<RequesterId>> {
        let Some(key) = mapping_key(request_id) else {
            return Ok(None);
        };
        let Some(raw) = self
            .kv
            .get(key.as_str())
            .await
            .map_err(|e| anyhow!("Failed to read correlation {}: {}", key, e))?
        else {
            return Ok(None);
        };

        let record: CorrelationRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(request_id = %request_id, "Unreadable correlation record: {}", e);
                return Ok(None);
            }
        };
        if record.is_expired(Utc::now()) {
            debug!(request_id = %request_id, "Correlation expired");
            return Ok(None);
        }
        Ok(Some(record.requester_id))
    }

    async fn delete(&self, request_id: &str) -> Result<()> {
        let Some(key) = mapping_key(request_id) else {
            return Ok(());
        };
        self.kv
            .delete(key.as_str())
            .await
            .map_err(|e| anyhow!("Failed to delete correlation {}: {}", key, e))?;
        Ok(())
    }
}
