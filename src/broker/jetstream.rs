//! NATS JetStream implementation of the durable logs
//!
//! - The outbound and inbound logs are JetStream streams bound to one subject each
//! - The consumer group is a durable pull consumer with explicit acks; every
//!   relay process pulls from the same durable, so each entry is handed to one
//!   member at a time and comes back after `ack_wait` if nobody acknowledges it
//! - Stream and consumer creation are idempotent

use super::traits::{InboundEntry, RequestLog, ResultCursor};
use super::StreamSettings;
use anyhow::{anyhow, Result};
use async_nats::jetstream::{self, consumer, stream, AckKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Derive a JetStream stream name from its subject (`schedule.results` → `SCHEDULE_RESULTS`).
///
/// Stream names may not contain `.`, `*`, `>` or whitespace.
pub fn stream_name_for(subject: &str) -> String {
    subject
        .chars()
        .map(|c| match c {
            'a'..='z' => c.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// Handle on both logs and the consumer group
#[derive(Clone)]
pub struct JetStreamBroker {
    context: jetstream::Context,
    settings: StreamSettings,
}

impl JetStreamBroker {
    /// Ensure both streams exist and return a broker bound to them.
    pub async fn setup(context: jetstream::Context, settings: StreamSettings) -> Result<Self> {
        let broker = Self { context, settings };
        broker.ensure_stream(&broker.settings.request_subject).await?;
        broker.ensure_stream(&broker.settings.result_subject).await?;
        Ok(broker)
    }

    pub fn context(&self) -> &jetstream::Context {
        &self.context
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    async fn ensure_stream(&self, subject: &str) -> Result<stream::Stream> {
        let name = stream_name_for(subject);
        let stream = self
            .context
            .get_or_create_stream(stream::Config {
                name: name.clone(),
                subjects: vec![subject.to_string()],
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to ensure stream {} ({}): {}", name, subject, e))?;
        debug!(stream = %name, subject = %subject, "Stream ready");
        Ok(stream)
    }

    /// Append side of the outbound (request) log
    pub fn request_log(&self) -> JetStreamRequestLog {
        JetStreamRequestLog {
            context: self.context.clone(),
            subject: self.settings.request_subject.clone(),
        }
    }

    /// Consumer-group configuration for the inbound log
    fn group_config(&self) -> consumer::pull::Config {
        consumer::pull::Config {
            durable_name: Some(self.settings.consumer_group.clone()),
            description: Some("schedule result delivery".to_string()),
            deliver_policy: consumer::DeliverPolicy::All,
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.settings.ack_wait,
            ..Default::default()
        }
    }

    /// Join the consumer group on the inbound log, creating the group if needed.
    pub async fn result_cursor(&self, consumer_name: impl Into<String>) -> Result<JetStreamResultCursor> {
        let consumer_name = consumer_name.into();
        let stream = self.ensure_stream(&self.settings.result_subject).await?;
        let group = &self.settings.consumer_group;
        let consumer = stream
            .get_or_create_consumer(group, self.group_config())
            .await
            .map_err(|e| anyhow!("Failed to join consumer group {}: {}", group, e))?;

        info!(
            group = %group,
            consumer = %consumer_name,
            subject = %self.settings.result_subject,
            "Joined result consumer group"
        );
        Ok(JetStreamResultCursor {
            consumer,
            name: consumer_name,
            pending: Mutex::new(HashMap::new()),
        })
    }
}

/// Publishes request envelopes to the outbound stream
#[derive(Clone)]
pub struct JetStreamRequestLog {
    context: jetstream::Context,
    subject: String,
}

#[async_trait]
impl RequestLog for JetStreamRequestLog {
    async fn append(&self, payload: Vec<u8>) -> Result<String> {
        let ack = self
            .context
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| anyhow!("Failed to publish to {}: {}", self.subject, e))?
            .await
            .map_err(|e| anyhow!("Stream did not confirm publish to {}: {}", self.subject, e))?;
        Ok(ack.sequence.to_string())
    }
}

/// One member of the result consumer group.
///
/// Messages read but not yet acknowledged are held by stream sequence so that
/// `ack` can be addressed by entry id alone.
pub struct JetStreamResultCursor {
    consumer: consumer::PullConsumer,
    name: String,
    pending: Mutex<HashMap<String, jetstream::Message>>,
}

#[async_trait]
impl ResultCursor for JetStreamResultCursor {
    fn consumer_name(&self) -> &str {
        &self.name
    }

    async fn read(&self, timeout: Duration) -> Result<Option<InboundEntry>> {
        let mut batch = self
            .consumer
            .batch()
            .max_messages(1)
            .expires(timeout)
            .messages()
            .await
            .map_err(|e| anyhow!("Failed to pull from result stream: {}", e))?;

        let Some(message) = batch.next().await else {
            return Ok(None);
        };
        let message = message.map_err(|e| anyhow!("Failed to receive result entry: {}", e))?;

        let (sequence, delivered) = {
            let info = message
                .info()
                .map_err(|e| anyhow!("Result entry has no JetStream metadata: {}", e))?;
            (info.stream_sequence, info.delivered)
        };
        let entry = InboundEntry {
            id: sequence.to_string(),
            payload: message.payload.to_vec(),
            delivery_count: u64::try_from(delivered).unwrap_or(1),
        };

        self.pending.lock().await.insert(entry.id.clone(), message);
        Ok(Some(entry))
    }

    async fn ack(&self, entry_id: &str) -> Result<()> {
        let message = self.take_pending(entry_id).await?;
        message
            .ack()
            .await
            .map_err(|e| anyhow!("Failed to ack entry {}: {}", entry_id, e))?;
        Ok(())
    }

    async fn release(&self, entry_id: &str, retry_after: Duration) -> Result<()> {
        let message = self.take_pending(entry_id).await?;
        message
            .ack_with(AckKind::Nak(Some(retry_after)))
            .await
            .map_err(|e| anyhow!("Failed to nak entry {}: {}", entry_id, e))?;
        Ok(())
    }
}

impl JetStreamResultCursor {
    /// Messages read by this member and not yet acked or released
    pub async fn held(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn take_pending(&self, entry_id: &str) -> Result<jetstream::Message> {
        self.pending
            .lock()
            .await
            .remove(entry_id)
            .ok_or_else(|| anyhow!("Entry {} is not pending on consumer {}", entry_id, self.name))
    }
}
