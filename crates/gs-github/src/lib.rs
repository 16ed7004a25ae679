pub mod client;
pub mod oauth;

pub use crate::client::{GitHubClient, GitHubConnector};
pub use crate::oauth::GitHubOAuth;

pub const API_BASE: &str = "https://api.github.com";
pub const OAUTH_BASE: &str = "https://github.com/login/oauth";

const USER_AGENT: &str = concat!("ghstat/", env!("CARGO_PKG_VERSION"));

fn http_error(err: reqwest::Error) -> gs_core::error::HostError {
    if err.is_timeout() {
        return gs_core::error::HostError::Timeout;
    }
    gs_core::error::HostError::Http {
        message: err.to_string(),
    }
}
