//! Delivery dispatcher: result envelope → requester → chat reply

use super::Outcome;
use crate::chat::ChatTransport;
use crate::correlation::CorrelationStore;
use crate::envelope::{RequesterId, ResultEnvelope};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SCHEDULE_HEADER: &str = "Your new schedule for the week:";

pub const NO_SHIFT: &str = "no shift";

pub const FAILURE_TEXT: &str =
    "Could not rebuild the schedule. Please contact your administrator.";

/// Days covered by one schedule, indexed from 0
pub const DAYS_PER_WEEK: i64 = 7;

/// Render the reply for `requester`.
///
/// Only the requester's own assignments are listed; each day of the week gets
/// one line, with shifts in the order the engine produced them.
pub fn render_reply(requester: RequesterId, envelope: &ResultEnvelope) -> String {
    if !envelope.is_success() {
        return FAILURE_TEXT.to_string();
    }

    let mut by_day: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
    for assignment in &envelope.assignments {
        if assignment.subject_id == requester.0
            && (0..DAYS_PER_WEEK).contains(&assignment.day_index)
        {
            by_day
                .entry(assignment.day_index)
                .or_default()
                .push(assignment.shift_label.as_str());
        }
    }

    let mut lines = vec![SCHEDULE_HEADER.to_string()];
    for day in 0..DAYS_PER_WEEK {
        match by_day.get(&day) {
            Some(shifts) if !shifts.is_empty() => {
                lines.push(format!("Day {}: {}", day, shifts.join(", ")))
            }
            _ => lines.push(format!("Day {}: {}", day, NO_SHIFT)),
        }
    }
    lines.join("\n")
}

/// Resolves a result to its requester and sends the rendered reply.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    store: Arc<dyn CorrelationStore>,
    transport: Arc<dyn ChatTransport>,
}

impl DeliveryDispatcher {
    pub fn new(store: Arc<dyn CorrelationStore>, transport: Arc<dyn ChatTransport>) -> Self {
        Self { store, transport }
    }

    /// Deliver one result.
    ///
    /// `Err` only when the store lookup itself fails; that outcome is not
    /// terminal and the entry must stay unacknowledged. Once a requester is
    /// found the correlation entry is deleted whether or not the send worked.
    pub async fn deliver(&self, envelope: &ResultEnvelope) -> Result<Outcome> {
        let request_id = envelope.request_id.as_str();
        let Some(requester) = self.store.get(request_id).await? else {
            debug!(request_id = %request_id, "No correlation for result (expired or already handled)");
            return Ok(Outcome::Unmatched);
        };

        let reply = render_reply(requester, envelope);
        let sent = self.transport.send(requester.0, &reply).await;

        if let Err(e) = self.store.delete(request_id).await {
            warn!(
                request_id = %request_id,
                "Failed to delete correlation (it will expire): {:#}",
                e
            );
        }

        match sent {
            Ok(()) => {
                info!(
                    request_id = %request_id,
                    requester = %requester,
                    transport = self.transport.name(),
                    "Schedule reply delivered"
                );
                Ok(Outcome::Delivered { requester })
            }
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    requester = %requester,
                    transport = self.transport.name(),
                    "Failed to send schedule reply: {:#}",
                    e
                );
                Ok(Outcome::SendFailed { requester })
            }
        }
    }
}
