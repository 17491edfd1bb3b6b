use tokio::sync::mpsc;

use crate::models::{AccountId, MessageId};

/// Hands a persisted message to whatever delivers mail. Fire-and-forget:
/// nothing about delivery is reported back to the composer.
pub trait Transmitter: Send + Sync {
    fn send_message(&self, message_id: MessageId, account_id: AccountId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundRequest {
    pub message_id: MessageId,
    pub account_id: AccountId,
}

/// Queues send requests for a delivery worker owned by the host application.
#[derive(Clone)]
pub struct OutboxHandle {
    tx: mpsc::UnboundedSender<OutboundRequest>,
}

impl OutboxHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (OutboxHandle { tx }, rx)
    }
}

impl Transmitter for OutboxHandle {
    fn send_message(&self, message_id: MessageId, account_id: AccountId) {
        log::debug!("Queueing message {message_id} for account {account_id}");
        if self
            .tx
            .send(OutboundRequest {
                message_id,
                account_id,
            })
            .is_err()
        {
            log::warn!("Outbox closed, message {message_id} not queued");
        }
    }
}
