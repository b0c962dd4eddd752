//! Test helper factories shared by the relay and front-end tests
//!
//! Builds engine-side result payloads and wires the in-memory backends into
//! publishers and consumers.
#![allow(dead_code)]

use crate::broker::mock::MockLog;
use crate::chat::mock::MockTransport;
use crate::chat::CommandEvent;
use crate::correlation::mock::MockCorrelationStore;
use crate::relay::{DeliveryDispatcher, RequestPublisher, ResultConsumer};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_ACK_WAIT: Duration = Duration::from_secs(30);
pub const TEST_TTL: Duration = Duration::from_secs(3600);
pub const TEST_POLL: Duration = Duration::from_millis(50);

// ============================================================================
// Result payloads (what the solver would append)
// ============================================================================

/// A success result holding one assignment
pub fn success_payload(request_id: &str, subject: i64, day: i64, shift: &str) -> String {
    serde_json::json!({
        "request_id": request_id,
        "status": "success",
        "assignments": [{"staff_id": subject, "day": day, "shift": shift}]
    })
    .to_string()
}

/// A failure result with the solver's error text
pub fn failure_payload(request_id: &str) -> String {
    serde_json::json!({
        "request_id": request_id,
        "status": "error",
        "error": "no feasible schedule"
    })
    .to_string()
}

/// A text message from a private chat (sender == conversation)
pub fn text_event(conversation_id: i64, text: &str) -> CommandEvent {
    CommandEvent {
        conversation_id,
        sender_id: conversation_id,
        text: text.to_string(),
    }
}

// ============================================================================
// Mock relay wiring
// ============================================================================

/// Every in-memory backend of one relay deployment
pub struct MockRelay {
    pub store: Arc<MockCorrelationStore>,
    pub transport: Arc<MockTransport>,
    pub requests: Arc<MockLog>,
    pub results: Arc<MockLog>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MockCorrelationStore::new()),
            transport: Arc::new(MockTransport::new()),
            requests: MockLog::new(TEST_ACK_WAIT),
            results: MockLog::new(TEST_ACK_WAIT),
        }
    }

    pub fn publisher(&self) -> RequestPublisher {
        RequestPublisher::new(self.store.clone(), self.requests.clone(), TEST_TTL)
    }

    /// A consumer-group member named `name` reading the result log
    pub fn consumer(&self, name: &str) -> ResultConsumer {
        ResultConsumer::new(
            Arc::new(self.results.cursor(name)),
            DeliveryDispatcher::new(self.store.clone(), self.transport.clone()),
            TEST_POLL,
        )
    }
}
