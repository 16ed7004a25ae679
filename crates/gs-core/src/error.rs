use crate::types::ConversationId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    Backend { message: String },
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("http error: {message}")]
    Http { message: String },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode failed: {message}")]
    Decode { message: String },
    #[error("timeout")]
    Timeout,
    #[error("rejected: {message}")]
    Rejected { message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("aggregation cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport http error: {message}")]
    Http { message: String },
    #[error("transport rejected request: {message}")]
    Rejected { message: String },
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("missing query parameter: {name}")]
    MissingParameter { name: &'static str },
    #[error("unknown or expired state")]
    UnknownState,
    #[error("credential exchange failed for conversation {conversation}: {reason}")]
    Exchange {
        conversation: ConversationId,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid settings: {message}")]
    Invalid { message: String },
}
