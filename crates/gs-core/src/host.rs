use crate::error::HostError;
use crate::types::CategoryCount;
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to a remote repository host on behalf of one user.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Login name of the account the credential belongs to.
    async fn user(&self) -> Result<String, HostError>;
    async fn repos(&self, user: &str) -> Result<Vec<String>, HostError>;
    /// Bytes per language for one repository.
    async fn languages(&self, user: &str, repo: &str) -> Result<CategoryCount, HostError>;
}

/// Builds a [`RepoHost`] bound to a stored credential.
pub trait HostConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Arc<dyn RepoHost>;
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;
    /// Exchanges an authorization code for an access credential.
    async fn exchange(&self, code: &str) -> Result<String, HostError>;
}
