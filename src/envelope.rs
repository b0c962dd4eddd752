//! Request and result envelopes carried by the durable logs
//!
//! Both envelopes travel as the whole JSON body of a JetStream message.
//! Field names on the wire follow what the scheduling engine already speaks
//! (`doctor_id`, `timestamp`, `staff_id`, `day`, `shift`); the Rust side uses
//! the neutral names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identity of whoever asked for a schedule. Doubles as the chat conversation id
/// the reply is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Why a request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestReason {
    /// A staff member asked through the chat front-end
    DoctorRequest,
    /// Submitted from the command line
    OperatorRequest,
}

// ============================================================================
// Request envelope
// ============================================================================

/// Outbound work request. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub request_id: String,
    #[serde(rename = "doctor_id", alias = "requester_id")]
    pub requester_id: RequesterId,
    #[serde(rename = "timestamp", alias = "issued_at")]
    pub issued_at: DateTime<Utc>,
    pub reason: RequestReason,
}

impl RequestEnvelope {
    /// Build an envelope with a fresh 128-bit random request id
    pub fn new(requester_id: RequesterId, reason: RequestReason) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            requester_id,
            issued_at: Utc::now(),
            reason,
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ============================================================================
// Result envelope
// ============================================================================

/// Outcome reported by the engine. Anything but `success` counts as a failure;
/// the engine reports a crashed solve as `error`. A missing status is a failure too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    #[default]
    #[serde(other)]
    Failure,
}

/// One shift given to one staff member on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "staff_id", alias = "subject_id")]
    pub subject_id: i64,
    /// Day of the week, 0-based. The engine's value is taken as-is; days
    /// outside the week are dropped when the reply is rendered.
    #[serde(rename = "day", alias = "day_index")]
    pub day_index: i64,
    #[serde(rename = "shift", alias = "shift_label")]
    pub shift_label: String,
}

/// Solver statistics attached to successful results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    #[serde(default)]
    pub solve_time: f64,
    #[serde(default)]
    pub num_assignments: usize,
}

/// Inbound result produced by the external engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub request_id: String,
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ResultMetrics>,
}

impl ResultEnvelope {
    /// Parse a raw log payload. Every error here is terminal for the entry.
    pub fn from_payload(payload: &[u8]) -> Result<Self, EnvelopeError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(EnvelopeError::Empty);
        }
        let envelope: Self = serde_json::from_slice(payload)?;
        if envelope.request_id.trim().is_empty() {
            return Err(EnvelopeError::MissingRequestId);
        }
        Ok(envelope)
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Why a payload could not be turned into an envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("empty payload")]
    Empty,
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope has no request_id")]
    MissingRequestId,
}
