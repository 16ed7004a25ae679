use crate::error::OutboxClosed;
use crate::transport::ChatTransport;
use gs_core::OutboundMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Producer side of the single outbound queue. Cloned into every lane and
/// into the HTTP callback state.
#[derive(Clone)]
pub struct Outbox {
    sender: mpsc::Sender<OutboundMessage>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, OutboundQueue { receiver })
    }

    pub async fn send(&self, message: OutboundMessage) -> Result<(), OutboxClosed> {
        self.sender.send(message).await.map_err(|_| OutboxClosed)
    }
}

/// Consumer side. Exactly one drain runs per queue.
pub struct OutboundQueue {
    receiver: mpsc::Receiver<OutboundMessage>,
}

impl OutboundQueue {
    /// Delivers queued messages one at a time, in queue order, until every
    /// [`Outbox`] has been dropped. Delivery failures are logged and skipped.
    pub async fn drain(mut self, transport: Arc<dyn ChatTransport>) {
        while let Some(message) = self.next().await {
            if let Err(err) = transport.send(&message).await {
                warn!(
                    conversation = %message.conversation,
                    error = %err,
                    "message delivery failed"
                );
            }
        }
        debug!("outbound queue drained");
    }

    pub async fn next(&mut self) -> Option<OutboundMessage> {
        self.receiver.recv().await
    }
}
