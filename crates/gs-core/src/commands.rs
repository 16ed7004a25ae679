use crate::aggregate::AggregationEngine;
use crate::correlation::CorrelationStore;
use crate::credentials::CredentialStore;
use crate::error::{AggregationError, CallbackError, HostError};
use crate::host::{HostConnector, OAuthProvider};
use crate::report;
use crate::types::{ConversationId, InboundEvent, Lane, OutboundMessage};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const HELP_TEXT: &str = "Bot that shows language statistics for your GitHub repositories.

You can control me by sending these commands:

*/authorize* - connect a GitHub account via OAuth
*/report* - language breakdown across your repositories
*/cancel* - disconnect the GitHub account
";
pub const ALREADY_AUTHORIZED: &str = "You are already authorized!";
pub const NEED_AUTHORIZATION: &str = "You need to authorize first. Command: /authorize";
pub const NOT_AUTHORIZED: &str = "You are not authorized!";
pub const DISCONNECTED: &str = "GitHub account disconnected!";
pub const ACCOUNT_FETCH_FAILED: &str =
    "Could not fetch account data. Please authorize again with /authorize.";
pub const REPORT_CANCELLED: &str = "Report cancelled.";
pub const CONNECTED: &str = "GitHub account connected!";
pub const CONNECT_FAILED: &str = "Failed to connect the GitHub account.";
pub const INTERNAL_FAILURE: &str = "Something went wrong, please try again later.";

/// Cancellation handles of report runs still in progress.
#[derive(Debug, Default)]
pub struct InFlightReports {
    next_id: AtomicU64,
    runs: Mutex<HashMap<ConversationId, (u64, CancellationToken)>>,
}

impl InFlightReports {
    fn register(&self, conversation: ConversationId) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Ok(mut runs) = self.runs.lock() {
            runs.insert(conversation, (id, token.clone()));
        }
        (id, token)
    }

    fn finish(&self, conversation: ConversationId, id: u64) {
        if let Ok(mut runs) = self.runs.lock() {
            if runs.get(&conversation).is_some_and(|(current, _)| *current == id) {
                runs.remove(&conversation);
            }
        }
    }

    /// Cancels the run for `conversation`, if any. Returns whether one was found.
    pub fn cancel(&self, conversation: ConversationId) -> bool {
        let run = self
            .runs
            .lock()
            .ok()
            .and_then(|mut runs| runs.remove(&conversation));
        match run {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handlers for every lane plus the OAuth callback completion.
pub struct Commands {
    credentials: Arc<dyn CredentialStore>,
    correlation: Arc<CorrelationStore>,
    oauth: Arc<dyn OAuthProvider>,
    hosts: Arc<dyn HostConnector>,
    engine: AggregationEngine,
    fetch_timeout: Duration,
    in_flight: InFlightReports,
}

impl Commands {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        correlation: Arc<CorrelationStore>,
        oauth: Arc<dyn OAuthProvider>,
        hosts: Arc<dyn HostConnector>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            correlation,
            oauth,
            hosts,
            engine: AggregationEngine::new(fetch_timeout),
            fetch_timeout,
            in_flight: InFlightReports::default(),
        }
    }

    pub fn in_flight(&self) -> &InFlightReports {
        &self.in_flight
    }

    pub async fn handle(&self, event: &InboundEvent) -> OutboundMessage {
        let conversation = event.conversation;
        match event.lane() {
            Lane::Start => Self::start(conversation),
            Lane::Authorize => self.authorize(conversation),
            Lane::Report => self.report(conversation).await,
            Lane::Cancel => self.cancel(conversation),
        }
    }

    pub fn start(conversation: ConversationId) -> OutboundMessage {
        OutboundMessage::markdown(conversation, HELP_TEXT)
    }

    /// A conversation that already holds a credential gets the same answer
    /// every time and no new correlation token.
    pub fn authorize(&self, conversation: ConversationId) -> OutboundMessage {
        match self.credentials.get(conversation) {
            Ok(Some(_)) => return OutboundMessage::plain(conversation, ALREADY_AUTHORIZED),
            Ok(None) => {}
            Err(err) => {
                error!(%conversation, error = %err, "credential lookup failed");
                return OutboundMessage::plain(conversation, INTERNAL_FAILURE);
            }
        }
        let token = self.correlation.create(conversation);
        let url = self.oauth.authorize_url(token.as_str());
        OutboundMessage::plain(
            conversation,
            format!("To authorize, follow this link:\n\n{url}\n"),
        )
    }

    /// Runs one report. The run is registered as in flight before the first
    /// remote call, so `cancel` can interrupt it at any stage.
    pub async fn report(&self, conversation: ConversationId) -> OutboundMessage {
        let credential = match self.credentials.get(conversation) {
            Ok(Some(credential)) => credential,
            Ok(None) => return OutboundMessage::plain(conversation, NEED_AUTHORIZATION),
            Err(err) => {
                error!(%conversation, error = %err, "credential lookup failed");
                return OutboundMessage::plain(conversation, INTERNAL_FAILURE);
            }
        };

        let (run, cancel) = self.in_flight.register(conversation);
        let outcome = self.run_report(conversation, &credential, &cancel).await;
        self.in_flight.finish(conversation, run);

        outcome.unwrap_or_else(|AggregationError::Cancelled| {
            info!(%conversation, "report cancelled");
            OutboundMessage::plain(conversation, REPORT_CANCELLED)
        })
    }

    async fn run_report(
        &self,
        conversation: ConversationId,
        credential: &str,
        cancel: &CancellationToken,
    ) -> Result<OutboundMessage, AggregationError> {
        let host = self.hosts.connect(credential);

        let user = match self.bounded(cancel, host.user()).await? {
            Ok(user) => user,
            Err(err) => {
                warn!(%conversation, error = %err, "account lookup failed");
                return Ok(OutboundMessage::plain(conversation, ACCOUNT_FETCH_FAILED));
            }
        };
        let repos = match self.bounded(cancel, host.repos(&user)).await? {
            Ok(repos) if !repos.is_empty() => repos,
            Ok(_) => return Ok(no_repos(conversation, &user)),
            Err(err) => {
                warn!(%conversation, user = %user, error = %err, "repository listing failed");
                return Ok(no_repos(conversation, &user));
            }
        };

        let aggregation = self.engine.aggregate(host, &user, repos, cancel).await?;
        Ok(match report::build(&aggregation.totals) {
            Some(entries) => {
                OutboundMessage::markdown(conversation, report::render(&user, &entries))
            }
            None => OutboundMessage::plain(conversation, format!("No language data for {user}.")),
        })
    }

    /// Drops the stored credential and stops any report still running for
    /// the conversation. Without a credential nothing is touched.
    pub fn cancel(&self, conversation: ConversationId) -> OutboundMessage {
        match self.credentials.get(conversation) {
            Ok(Some(_)) => {}
            Ok(None) => return OutboundMessage::plain(conversation, NOT_AUTHORIZED),
            Err(err) => {
                error!(%conversation, error = %err, "credential lookup failed");
                return OutboundMessage::plain(conversation, INTERNAL_FAILURE);
            }
        }
        if let Err(err) = self.credentials.delete(conversation) {
            error!(%conversation, error = %err, "credential delete failed");
            return OutboundMessage::plain(conversation, INTERNAL_FAILURE);
        }
        if self.in_flight.cancel(conversation) {
            info!(%conversation, "cancelled running report");
        }
        OutboundMessage::plain(conversation, DISCONNECTED)
    }

    /// Finishes the OAuth handshake started by [`Commands::authorize`] and
    /// returns the success notice for the originating conversation.
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<OutboundMessage, CallbackError> {
        let code = non_empty(code).ok_or(CallbackError::MissingParameter { name: "code" })?;
        let state = non_empty(state).ok_or(CallbackError::MissingParameter { name: "state" })?;
        let conversation = self
            .correlation
            .resolve(state)
            .ok_or(CallbackError::UnknownState)?;
        let credential = self
            .oauth
            .exchange(code)
            .await
            .map_err(|err| CallbackError::Exchange {
                conversation,
                reason: err.to_string(),
            })?;
        self.credentials.add(conversation, &credential)?;
        info!(%conversation, "account connected");
        Ok(OutboundMessage::plain(conversation, CONNECTED))
    }

    /// Message owed to a conversation after a failed callback, if the
    /// failure happened after the conversation was known.
    pub fn failure_notice(err: &CallbackError) -> Option<OutboundMessage> {
        match err {
            CallbackError::Exchange { conversation, .. } => {
                Some(OutboundMessage::plain(*conversation, CONNECT_FAILED))
            }
            _ => None,
        }
    }

    /// Runs a single remote call under the fetch timeout, giving up early
    /// when the report is cancelled.
    async fn bounded<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, HostError>>,
    ) -> Result<Result<T, HostError>, AggregationError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AggregationError::Cancelled),
            result = tokio::time::timeout(self.fetch_timeout, call) => {
                Ok(result.unwrap_or(Err(HostError::Timeout)))
            }
        }
    }
}

fn no_repos(conversation: ConversationId, user: &str) -> OutboundMessage {
    OutboundMessage::plain(conversation, format!("No repositories found for {user}."))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::testing::{FakeConnector, FakeHost, FakeOAuth, RepoBehavior};
    use crate::types::{CategoryCount, TextFormat};

    struct Fixture {
        commands: Arc<Commands>,
        credentials: Arc<MemoryCredentialStore>,
        correlation: Arc<CorrelationStore>,
        connector: Arc<FakeConnector>,
    }

    fn fixture(host: FakeHost) -> Fixture {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let correlation = Arc::new(CorrelationStore::new(Duration::from_secs(600), 32));
        let connector = Arc::new(FakeConnector::new(host));
        let commands = Arc::new(Commands::new(
            credentials.clone(),
            correlation.clone(),
            Arc::new(FakeOAuth),
            connector.clone(),
            Duration::from_secs(5),
        ));
        Fixture {
            commands,
            credentials,
            correlation,
            connector,
        }
    }

    fn counts(pairs: &[(&str, u64)]) -> CategoryCount {
        pairs
            .iter()
            .map(|(name, bytes)| ((*name).to_string(), *bytes))
            .collect()
    }

    const CHAT: ConversationId = ConversationId::new(11);

    fn state_from_link(text: &str) -> String {
        text.trim().rsplit('=').next().unwrap().to_string()
    }

    #[test]
    fn authorize_issues_link_with_state() {
        let fx = fixture(FakeHost::new("octo"));
        let reply = fx.commands.authorize(CHAT);
        assert!(reply.text.contains("https://auth.example/authorize?state="));
        assert_eq!(fx.correlation.pending(), 1);
    }

    #[test]
    fn authorize_is_idempotent_once_authorized() {
        let fx = fixture(FakeHost::new("octo"));
        fx.credentials.add(CHAT, "tok").unwrap();
        let first = fx.commands.authorize(CHAT);
        let second = fx.commands.authorize(CHAT);
        assert_eq!(first, second);
        assert_eq!(first.text, ALREADY_AUTHORIZED);
        assert_eq!(fx.correlation.pending(), 0);
    }

    #[test]
    fn cancel_without_credential_is_noop() {
        let fx = fixture(FakeHost::new("octo"));
        assert_eq!(fx.commands.cancel(CHAT).text, NOT_AUTHORIZED);
        assert!(fx.credentials.is_empty());
    }

    #[test]
    fn cancel_deletes_once() {
        let fx = fixture(FakeHost::new("octo"));
        fx.credentials.add(CHAT, "tok").unwrap();
        assert_eq!(fx.commands.cancel(CHAT).text, DISCONNECTED);
        assert_eq!(fx.credentials.get(CHAT).unwrap(), None);
        assert_eq!(fx.commands.cancel(CHAT).text, NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn report_requires_credential() {
        let fx = fixture(FakeHost::new("octo"));
        assert_eq!(fx.commands.report(CHAT).await.text, NEED_AUTHORIZATION);
        assert_eq!(fx.connector.host().language_calls(), 0);
    }

    #[tokio::test]
    async fn report_skips_failed_repos() {
        let host = FakeHost::new("octo")
            .with_repo("a", RepoBehavior::Counts(counts(&[("Rust", 750), ("Go", 250)])))
            .with_repo("b", RepoBehavior::Fail);
        let fx = fixture(host);
        fx.credentials.add(CHAT, "tok").unwrap();

        let reply = fx.commands.report(CHAT).await;

        assert_eq!(reply.format, TextFormat::Markdown);
        assert!(reply.text.contains("*octo*"));
        assert!(reply.text.contains("*Rust* 75.0%\n*Go* 25.0%\n"));
        assert_eq!(fx.connector.credentials_seen(), vec!["tok".to_string()]);
        assert!(fx.commands.in_flight().is_empty());
    }

    #[tokio::test]
    async fn report_without_repos() {
        let fx = fixture(FakeHost::new("octo"));
        fx.credentials.add(CHAT, "tok").unwrap();
        assert_eq!(
            fx.commands.report(CHAT).await.text,
            "No repositories found for octo."
        );
    }

    #[tokio::test]
    async fn report_with_only_empty_repos_has_no_data() {
        let fx = fixture(FakeHost::new("octo").with_repo("a", RepoBehavior::Fail));
        fx.credentials.add(CHAT, "tok").unwrap();
        assert_eq!(fx.commands.report(CHAT).await.text, "No language data for octo.");
    }

    #[tokio::test]
    async fn report_with_rejected_credential() {
        let fx = fixture(FakeHost::new("octo").failing_user());
        fx.credentials.add(CHAT, "tok").unwrap();
        assert_eq!(fx.commands.report(CHAT).await.text, ACCOUNT_FETCH_FAILED);
    }

    #[tokio::test]
    async fn cancel_interrupts_running_report() {
        let fx = fixture(FakeHost::new("octo").with_repo("slow", RepoBehavior::Hang));
        fx.credentials.add(CHAT, "tok").unwrap();
        let commands = fx.commands.clone();
        let running = tokio::spawn(async move { commands.report(CHAT).await });
        while fx.commands.in_flight().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(fx.commands.cancel(CHAT).text, DISCONNECTED);
        assert_eq!(running.await.unwrap().text, REPORT_CANCELLED);
    }

    #[tokio::test]
    async fn cancel_during_repository_listing_stops_report() {
        let host = FakeHost::new("octo")
            .with_listing_delay(Duration::from_millis(200))
            .with_repo("a", RepoBehavior::Counts(counts(&[("Rust", 10)])));
        let fx = fixture(host);
        fx.credentials.add(CHAT, "tok").unwrap();
        let commands = fx.commands.clone();
        let running = tokio::spawn(async move { commands.report(CHAT).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!fx.commands.in_flight().is_empty());
        assert_eq!(fx.commands.cancel(CHAT).text, DISCONNECTED);
        assert_eq!(running.await.unwrap().text, REPORT_CANCELLED);
        assert_eq!(fx.connector.host().language_calls(), 0);
        assert!(fx.commands.in_flight().is_empty());
    }

    #[tokio::test]
    async fn callback_stores_credential() {
        let fx = fixture(FakeHost::new("octo"));
        let reply = fx.commands.authorize(CHAT);
        let state = state_from_link(&reply.text);

        let notice = fx
            .commands
            .complete_authorization(Some("abc"), Some(&state))
            .await
            .unwrap();

        assert_eq!(notice, OutboundMessage::plain(CHAT, CONNECTED));
        assert_eq!(fx.credentials.get(CHAT).unwrap().as_deref(), Some("token-abc"));
        assert_eq!(fx.correlation.pending(), 0);
    }

    #[tokio::test]
    async fn callback_rejects_missing_and_unknown_state() {
        let fx = fixture(FakeHost::new("octo"));
        let missing = fx.commands.complete_authorization(Some("abc"), None).await;
        assert!(matches!(
            missing,
            Err(CallbackError::MissingParameter { name: "state" })
        ));
        let unknown = fx
            .commands
            .complete_authorization(Some("abc"), Some("forged"))
            .await;
        assert!(matches!(unknown, Err(CallbackError::UnknownState)));
        assert!(fx.credentials.is_empty());
    }

    #[tokio::test]
    async fn failed_exchange_notifies_and_stores_nothing() {
        let fx = fixture(FakeHost::new("octo"));
        let reply = fx.commands.authorize(CHAT);
        let state = state_from_link(&reply.text);

        let err = fx
            .commands
            .complete_authorization(Some("bad"), Some(&state))
            .await
            .unwrap_err();

        assert_eq!(
            Commands::failure_notice(&err),
            Some(OutboundMessage::plain(CHAT, CONNECT_FAILED))
        );
        assert!(fx.credentials.is_empty());
    }
}
