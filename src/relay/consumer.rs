//! Result consumer: the background poll loop and its acknowledgement tracking
//!
//! Every entry read from the group reaches exactly one of these ends:
//! - acked once, after a terminal outcome (delivered, send failed, unmatched, malformed)
//! - released unacked because the correlation store could not be consulted; the
//!   broker hands it out again after `STORE_FAULT_RETRY`

use super::dispatcher::DeliveryDispatcher;
use super::Outcome;
use crate::broker::{InboundEntry, ResultCursor};
use crate::envelope::ResultEnvelope;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed read so a dead broker does not turn the loop into a spin
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Delay before an entry released on a store fault is handed out again
pub const STORE_FAULT_RETRY: Duration = Duration::from_secs(5);

pub struct ResultConsumer {
    cursor: Arc<dyn ResultCursor>,
    dispatcher: DeliveryDispatcher,
    poll_timeout: Duration,
}

impl ResultConsumer {
    pub fn new(
        cursor: Arc<dyn ResultCursor>,
        dispatcher: DeliveryDispatcher,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            cursor,
            dispatcher,
            poll_timeout,
        }
    }

    pub fn consumer_name(&self) -> &str {
        self.cursor.consumer_name()
    }

    /// Poll until `shutdown` fires.
    ///
    /// Cancellation is only observed while waiting on the log; an entry that
    /// has been read is always processed to its end first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            consumer = %self.consumer_name(),
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "Result consumer started"
        );

        loop {
            let read = tokio::select! {
                _ = shutdown.cancelled() => break,
                read = self.cursor.read(self.poll_timeout) => read,
            };

            match read {
                Ok(Some(entry)) => {
                    self.handle_entry(entry).await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(consumer = %self.consumer_name(), "Error reading results: {:#}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!(consumer = %self.consumer_name(), "Result consumer stopped");
    }

    /// Read at most one entry and process it.
    ///
    /// `Ok(None)` covers both an empty poll and an entry left for redelivery.
    pub async fn poll_once(&self) -> Result<Option<Outcome>> {
        match self.cursor.read(self.poll_timeout).await? {
            Some(entry) => Ok(self.handle_entry(entry).await),
            None => Ok(None),
        }
    }

    /// Take one entry to its outcome and acknowledge it.
    ///
    /// Returns `None` without acknowledging when the outcome is not terminal;
    /// the entry is released back to the group instead.
    pub async fn handle_entry(&self, entry: InboundEntry) -> Option<Outcome> {
        let consumer = self.consumer_name();
        let outcome = match ResultEnvelope::from_payload(&entry.payload) {
            Err(e) => {
                warn!(
                    consumer = %consumer,
                    entry_id = %entry.id,
                    delivery_count = entry.delivery_count,
                    "Dropping malformed result payload: {}",
                    e
                );
                Outcome::Malformed
            }
            Ok(envelope) => {
                if let Some(metrics) = &envelope.metrics {
                    debug!(
                        request_id = %envelope.request_id,
                        solve_time = metrics.solve_time,
                        num_assignments = metrics.num_assignments,
                        "Engine metrics"
                    );
                }
                if let Some(error) = &envelope.error {
                    debug!(request_id = %envelope.request_id, "Engine reported: {}", error);
                }

                match self.dispatcher.deliver(&envelope).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            consumer = %consumer,
                            entry_id = %entry.id,
                            request_id = %envelope.request_id,
                            "Correlation lookup failed; releasing entry for redelivery: {:#}",
                            e
                        );
                        if let Err(e) = self.cursor.release(&entry.id, STORE_FAULT_RETRY).await {
                            warn!(
                                consumer = %consumer,
                                entry_id = %entry.id,
                                "Failed to release result entry (it returns after ack_wait): {:#}",
                                e
                            );
                        }
                        return None;
                    }
                }
            }
        };

        if let Err(e) = self.cursor.ack(&entry.id).await {
            warn!(
                consumer = %consumer,
                entry_id = %entry.id,
                "Failed to ack result entry (it will be redelivered): {:#}",
                e
            );
        }
        debug!(
            consumer = %consumer,
            entry_id = %entry.id,
            delivery_count = entry.delivery_count,
            outcome = ?outcome,
            "Result entry processed"
        );
        Some(outcome)
    }
}
