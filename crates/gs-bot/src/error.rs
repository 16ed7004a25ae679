use gs_core::Lane;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{lane} lane is full")]
    Full { lane: Lane },
    #[error("{lane} lane is closed")]
    Closed { lane: Lane },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("outbound queue is closed")]
pub struct OutboxClosed;
