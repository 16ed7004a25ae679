pub mod error;
pub mod outbound;
pub mod router;
pub mod transport;

pub use crate::outbound::{OutboundQueue, Outbox};
pub use crate::router::{CommandRouter, LaneHandler, RouterConfig};
pub use crate::transport::ChatTransport;
