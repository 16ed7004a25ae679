//! In-process fakes for the remote capabilities.

use crate::error::HostError;
use crate::host::{HostConnector, OAuthProvider, RepoHost};
use crate::types::CategoryCount;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

#[derive(Debug, Clone)]
pub enum RepoBehavior {
    Counts(CategoryCount),
    Fail,
    Hang,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    user: String,
    repos: Vec<(String, RepoBehavior)>,
    fail_user: bool,
    listing_delay: Option<Duration>,
    barrier: Option<Arc<Barrier>>,
    language_calls: AtomicUsize,
}

impl FakeHost {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_repo(mut self, name: &str, behavior: RepoBehavior) -> Self {
        self.repos.push((name.to_string(), behavior));
        self
    }

    /// Every `languages` call waits until `parties` calls are in flight.
    #[must_use]
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    #[must_use]
    pub fn failing_user(mut self) -> Self {
        self.fail_user = true;
        self
    }

    /// `repos` sleeps for `delay` before answering.
    #[must_use]
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = Some(delay);
        self
    }

    pub fn repo_names(&self) -> Vec<String> {
        self.repos.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn language_calls(&self) -> usize {
        self.language_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn user(&self) -> Result<String, HostError> {
        if self.fail_user {
            return Err(HostError::Status {
                status: 401,
                body: "bad credentials".to_string(),
            });
        }
        Ok(self.user.clone())
    }

    async fn repos(&self, _user: &str) -> Result<Vec<String>, HostError> {
        if let Some(delay) = self.listing_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.repo_names())
    }

    async fn languages(&self, _user: &str, repo: &str) -> Result<CategoryCount, HostError> {
        self.language_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        let behavior = self
            .repos
            .iter()
            .find(|(name, _)| name == repo)
            .map(|(_, behavior)| behavior.clone());
        match behavior {
            Some(RepoBehavior::Counts(counts)) => Ok(counts),
            Some(RepoBehavior::Hang) => std::future::pending().await,
            Some(RepoBehavior::Fail) | None => Err(HostError::Status {
                status: 404,
                body: format!("no such repo: {repo}"),
            }),
        }
    }
}

#[derive(Debug)]
pub struct FakeConnector {
    host: Arc<FakeHost>,
    credentials: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(host: FakeHost) -> Self {
        Self {
            host: Arc::new(host),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn host(&self) -> &FakeHost {
        &self.host
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl HostConnector for FakeConnector {
    fn connect(&self, credential: &str) -> Arc<dyn RepoHost> {
        if let Ok(mut guard) = self.credentials.lock() {
            guard.push(credential.to_string());
        }
        self.host.clone()
    }
}

/// Exchanges any code for `token-<code>`, except the code `bad`.
#[derive(Debug, Default)]
pub struct FakeOAuth;

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://auth.example/authorize?state={state}")
    }

    async fn exchange(&self, code: &str) -> Result<String, HostError> {
        if code == "bad" {
            return Err(HostError::Rejected {
                message: "bad_verification_code".to_string(),
            });
        }
        Ok(format!("token-{code}"))
    }
}
