//! Durable logs: outbound requests, inbound results, and the consumer group
//!
//! This module provides:
//! - `RequestLog`: append side used by the request publisher
//! - `ResultCursor`: one consumer-group member's read/ack view of the result log
//! - `JetStreamBroker`: NATS JetStream backed implementation of both

pub mod jetstream;
pub mod traits;

pub use self::jetstream::{stream_name_for, JetStreamBroker, JetStreamRequestLog, JetStreamResultCursor};
pub use traits::{InboundEntry, RequestLog, ResultCursor};


use std::time::Duration;

/// Subjects and group settings shared by every relay instance
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Subject of the outbound (request) log
    pub request_subject: String,
    /// Subject of the inbound (result) log
    pub result_subject: String,
    /// Durable consumer group name on the result log
    pub consumer_group: String,
    /// How long an entry may stay unacknowledged before redelivery
    pub ack_wait: Duration,
}

/// Connect to a NATS server.
pub async fn connect_nats(url: &str) -> anyhow::Result<async_nats::Client> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to NATS at {}: {}", url, e))?;
    tracing::info!("Connected to NATS at {}", url);
    Ok(client)
}
