//! Chat front-end: answers incoming commands and submits reschedule requests

use crate::chat::commands::{
    unavailable_ack, Command, HELP_TEXT, INVALID_PERIOD_TEXT, REQUEST_ACCEPTED_TEXT,
    SUBMIT_FAILED_TEXT, WELCOME_TEXT,
};
use crate::chat::{ChatTransport, CommandEvent};
use crate::envelope::RequesterId;
use crate::relay::RequestPublisher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ChatFrontend {
    transport: Arc<dyn ChatTransport>,
    publisher: RequestPublisher,
}

impl ChatFrontend {
    pub fn new(transport: Arc<dyn ChatTransport>, publisher: RequestPublisher) -> Self {
        Self {
            transport,
            publisher,
        }
    }

    /// Answer events from `rx` until the channel closes or `shutdown` fires
    pub async fn run(&self, mut rx: mpsc::Receiver<CommandEvent>, shutdown: CancellationToken) {
        info!(transport = self.transport.name(), "Chat front-end started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle(&event).await,
                    None => break,
                },
            }
        }
        info!(transport = self.transport.name(), "Chat front-end stopped");
    }

    /// Compute the reply and send it back to the conversation
    pub async fn handle(&self, event: &CommandEvent) {
        let reply = self.reply_for(event).await;
        if let Err(e) = self.transport.send(event.conversation_id, &reply).await {
            warn!(
                conversation_id = event.conversation_id,
                "Failed to answer command: {:#}",
                e
            );
        }
    }

    /// The reply text for one event. `/reschedule` publishes a request on the
    /// conversation's behalf before answering.
    pub async fn reply_for(&self, event: &CommandEvent) -> String {
        let command = Command::parse(event);
        debug!(
            conversation_id = event.conversation_id,
            sender_id = event.sender_id,
            command = ?command,
            "Command received"
        );

        match command {
            Command::Start => WELCOME_TEXT.to_string(),
            Command::Help | Command::Unknown => HELP_TEXT.to_string(),
            Command::Reschedule => {
                let requester = RequesterId(event.conversation_id);
                match self.publisher.publish(requester).await {
                    Ok(_) => REQUEST_ACCEPTED_TEXT.to_string(),
                    Err(e) => {
                        warn!(requester = %requester, "Reschedule request not submitted: {}", e);
                        SUBMIT_FAILED_TEXT.to_string()
                    }
                }
            }
            Command::Unavailable { from, to } => {
                info!(
                    sender_id = event.sender_id,
                    from = %from,
                    to = %to,
                    "Unavailability reported"
                );
                unavailable_ack(from, to)
            }
            Command::InvalidPeriod => INVALID_PERIOD_TEXT.to_string(),
        }
    }
}
