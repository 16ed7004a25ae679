use async_trait::async_trait;
use gs_core::error::TransportError;
use gs_core::{InboundEvent, OutboundMessage};

/// Wire-level chat connection.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Waits for the next batch of updates. An empty batch is not an error.
    async fn poll(&self) -> Result<Vec<InboundEvent>, TransportError>;

    /// Delivers one message. Callers never overlap two sends.
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}
