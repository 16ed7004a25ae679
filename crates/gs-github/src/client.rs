use crate::{API_BASE, USER_AGENT, http_error};
use async_trait::async_trait;
use gs_core::error::HostError;
use gs_core::host::{HostConnector, RepoHost};
use gs_core::types::CategoryCount;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

const PER_PAGE: usize = 100;

/// Shares one HTTP connection pool between all per-credential clients.
#[derive(Clone)]
pub struct GitHubConnector {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubConnector {
    pub fn new() -> Result<Self, HostError> {
        Self::with_base(API_BASE)
    }

    pub fn with_base(api_base: &str) -> Result<Self, HostError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(http_error)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl HostConnector for GitHubConnector {
    fn connect(&self, credential: &str) -> Arc<dyn RepoHost> {
        Arc::new(GitHubClient {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            token: credential.to_string(),
        })
    }
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoSummary {
    name: String,
}

impl GitHubClient {
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HostError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await.map_err(http_error)?;
        serde_json::from_slice(&bytes).map_err(|err| HostError::Decode {
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn user(&self) -> Result<String, HostError> {
        let account: Account = self.get_json("/user", &[]).await?;
        Ok(account.login)
    }

    async fn repos(&self, user: &str) -> Result<Vec<String>, HostError> {
        let path = format!("/users/{user}/repos");
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let query = [
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: Vec<RepoSummary> = self.get_json(&path, &query).await?;
            let fetched = batch.len();
            names.extend(batch.into_iter().map(|repo| repo.name));
            if !has_next_page(fetched) {
                break;
            }
            page += 1;
        }
        debug!(user = %user, repos = names.len(), pages = page, "listed repositories");
        Ok(names)
    }

    async fn languages(&self, user: &str, repo: &str) -> Result<CategoryCount, HostError> {
        self.get_json(&format!("/repos/{user}/{repo}/languages"), &[])
            .await
    }
}

fn has_next_page(fetched: usize) -> bool {
    fetched == PER_PAGE
}
