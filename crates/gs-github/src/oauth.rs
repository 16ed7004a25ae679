use crate::{OAUTH_BASE, USER_AGENT, http_error};
use async_trait::async_trait;
use gs_core::error::HostError;
use gs_core::host::OAuthProvider;
use reqwest::Url;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

pub struct GitHubOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    scope: String,
    authorize_endpoint: Url,
    token_endpoint: Url,
}

#[derive(Debug, Serialize)]
struct AccessTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GitHubOAuth {
    pub fn new(client_id: &str, client_secret: &str, scope: &str) -> Result<Self, HostError> {
        Self::with_base(client_id, client_secret, scope, OAUTH_BASE)
    }

    pub fn with_base(
        client_id: &str,
        client_secret: &str,
        scope: &str,
        base: &str,
    ) -> Result<Self, HostError> {
        let base = base.trim_end_matches('/');
        let endpoint = |path: &str| {
            Url::parse(&format!("{base}/{path}")).map_err(|err| HostError::Rejected {
                message: format!("invalid oauth base url: {err}"),
            })
        };
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(http_error)?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
            authorize_endpoint: endpoint("authorize")?,
            token_endpoint: endpoint("access_token")?,
        })
    }
}

#[async_trait]
impl OAuthProvider for GitHubOAuth {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        url.into()
    }

    async fn exchange(&self, code: &str) -> Result<String, HostError> {
        let request = AccessTokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code,
        };
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&request)
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
        let body: AccessTokenResponse = response.json().await.map_err(|err| HostError::Decode {
            message: err.to_string(),
        })?;
        access_token(body)
    }
}

/// GitHub answers 200 with an `error` field for bad codes, so an empty token
/// has to be treated as a rejection.
fn access_token(body: AccessTokenResponse) -> Result<String, HostError> {
    match body.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(HostError::Rejected {
            message: body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "no access token in response".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_state_and_scope() {
        let oauth = GitHubOAuth::new("client-1", "secret", "repo").unwrap();
        let url = Url::parse(&oauth.authorize_url("abcXYZ123")).unwrap();
        assert_eq!(url.path(), "/login/oauth/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("client_id".to_string(), "client-1".to_string()),
                ("scope".to_string(), "repo".to_string()),
                ("state".to_string(), "abcXYZ123".to_string()),
            ]
        );
    }

    #[test]
    fn token_response_with_error_is_rejected() {
        let body: AccessTokenResponse = serde_json::from_str(
            r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        )
        .unwrap();
        let err = access_token(body).unwrap_err();
        assert!(err.to_string().contains("incorrect or expired"));
    }

    #[test]
    fn token_response_with_token_is_accepted() {
        let body: AccessTokenResponse = serde_json::from_str(
            r#"{"access_token":"gho_abc","token_type":"bearer","scope":"repo"}"#,
        )
        .unwrap();
        assert_eq!(access_token(body).unwrap(), "gho_abc");
        assert!(access_token(AccessTokenResponse::default()).is_err());
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(GitHubOAuth::with_base("id", "secret", "repo", "not a url").is_err());
    }
}
