//! Request/result relay
//!
//! Outbound, a [`RequestPublisher`] records who asked and appends the request
//! envelope. Inbound, a [`ResultConsumer`] reads results as one member of the
//! consumer group and hands each to the [`DeliveryDispatcher`], which resolves
//! the requester and sends the rendered reply.

pub mod consumer;
pub mod dispatcher;
pub mod publisher;

pub use consumer::ResultConsumer;
pub use dispatcher::{render_reply, DeliveryDispatcher};
pub use publisher::{PublishError, RequestPublisher};

use crate::envelope::RequesterId;

/// Terminal result of processing one result entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply sent to the requester
    Delivered { requester: RequesterId },
    /// Requester resolved but the chat send failed; the entry is still acked
    SendFailed { requester: RequesterId },
    /// No live correlation: expired, already delivered, or never ours
    Unmatched,
    /// Payload could not be decoded
    Malformed,
}

/// Member name inside the consumer group: host name plus a short random suffix
pub fn consumer_name() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "relay".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host.trim(), &suffix[..8])
}
