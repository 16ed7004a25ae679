pub mod aggregate;
pub mod commands;
pub mod correlation;
pub mod credentials;
pub mod error;
pub mod host;
pub mod report;
pub mod settings;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use crate::commands::Commands;
pub use crate::correlation::{CorrelationStore, CorrelationToken};
pub use crate::credentials::{CredentialStore, MemoryCredentialStore};
pub use crate::types::{ConversationId, InboundEvent, Lane, OutboundMessage, TextFormat};
