pub mod api;
pub mod transport;

pub use crate::transport::TelegramTransport;
