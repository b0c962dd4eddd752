//! Request publisher: correlation entry first, then the request envelope

use crate::broker::RequestLog;
use crate::correlation::CorrelationStore;
use crate::envelope::{EnvelopeError, RequestEnvelope, RequestReason, RequesterId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Why a request could not be submitted. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode request envelope: {0}")]
    Encode(#[from] EnvelopeError),
    #[error("failed to record correlation for {request_id}: {cause:#}")]
    Correlation {
        request_id: String,
        cause: anyhow::Error,
    },
    #[error("failed to append request {request_id}: {cause:#}")]
    Append {
        request_id: String,
        cause: anyhow::Error,
    },
}

/// Turns a requester into a published, trackable request.
///
/// The correlation entry is written before the envelope is appended, so a
/// result can never arrive for an id the store has not seen. When the append
/// fails the fresh entry is removed in the background; the caller gets the
/// error without waiting for that cleanup.
#[derive(Clone)]
pub struct RequestPublisher {
    store: Arc<dyn CorrelationStore>,
    log: Arc<dyn RequestLog>,
    ttl: Duration,
}

impl RequestPublisher {
    pub fn new(store: Arc<dyn CorrelationStore>, log: Arc<dyn RequestLog>, ttl: Duration) -> Self {
        Self { store, log, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Publish a chat-originated request; returns the new request id.
    pub async fn publish(&self, requester: RequesterId) -> Result<String, PublishError> {
        self.publish_with_reason(requester, RequestReason::DoctorRequest)
            .await
    }

    pub async fn publish_with_reason(
        &self,
        requester: RequesterId,
        reason: RequestReason,
    ) -> Result<String, PublishError> {
        let envelope = RequestEnvelope::new(requester, reason);
        let payload = envelope.to_payload()?;
        let request_id = envelope.request_id;

        self.store
            .set(&request_id, requester, self.ttl)
            .await
            .map_err(|cause| PublishError::Correlation {
                request_id: request_id.clone(),
                cause,
            })?;

        match self.log.append(payload).await {
            Ok(entry_id) => {
                info!(
                    request_id = %request_id,
                    requester = %requester,
                    entry_id = %entry_id,
                    "Request published"
                );
                Ok(request_id)
            }
            Err(cause) => {
                let store = Arc::clone(&self.store);
                let orphan = request_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.delete(&orphan).await {
                        warn!(
                            request_id = %orphan,
                            "Could not remove correlation after failed publish (it will expire): {:#}",
                            e
                        );
                    }
                });
                Err(PublishError::Append { request_id, cause })
            }
        }
    }
}
