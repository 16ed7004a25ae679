use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use gs_bot::{OutboundQueue, Outbox};
use gs_core::testing::{FakeConnector, FakeHost, FakeOAuth};
use gs_core::{
    Commands, ConversationId, CorrelationStore, CredentialStore, InboundEvent,
    MemoryCredentialStore,
};
use gs_serve::middleware::request_id::HEADER_NAME;
use gs_serve::{AppState, app};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const CHAT: ConversationId = ConversationId::new(4242);
const BOT_LINK: &str = "https://t.me/ghstat_bot";

struct Harness {
    state: AppState,
    queue: OutboundQueue,
    credentials: Arc<MemoryCredentialStore>,
    correlation: Arc<CorrelationStore>,
}

fn harness() -> Harness {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let correlation = Arc::new(CorrelationStore::new(Duration::from_secs(600), 32));
    let commands = Arc::new(Commands::new(
        credentials.clone(),
        correlation.clone(),
        Arc::new(FakeOAuth),
        Arc::new(FakeConnector::new(FakeHost::new("octocat"))),
        Duration::from_secs(5),
    ));
    let (outbox, queue) = Outbox::channel(8);
    Harness {
        state: AppState {
            commands,
            outbox,
            bot_link: BOT_LINK.to_string(),
        },
        queue,
        credentials,
        correlation,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn successful_callback_stores_credential_and_redirects() {
    let mut h = harness();
    let state = h.correlation.create(CHAT);
    let uri = format!("/github_redirect?code=abc&state={}", state.as_str());

    let response = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], BOT_LINK);
    assert!(response.headers().contains_key(HEADER_NAME));
    assert_eq!(h.credentials.get(CHAT).unwrap().as_deref(), Some("token-abc"));

    let notice = h.queue.next().await.unwrap();
    assert_eq!(notice.conversation, CHAT);
    assert_eq!(notice.text, gs_core::commands::CONNECTED);
}

#[tokio::test]
async fn state_is_single_use() {
    let h = harness();
    let state = h.correlation.create(CHAT);
    let uri = format!("/github_redirect?code=abc&state={}", state.as_str());

    let first = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::MOVED_PERMANENTLY);
    let replay = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(replay.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_parameter_is_bad_request() {
    let h = harness();
    let state = h.correlation.create(CHAT);

    let response = app(h.state.clone())
        .oneshot(get("/github_redirect?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_input");
    assert!(body["request_id"].as_str().unwrap().starts_with("req_"));

    let uri = format!("/github_redirect?state={}", state.as_str());
    let response = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.credentials.is_empty());
}

#[tokio::test]
async fn unknown_state_is_not_found() {
    let h = harness();
    h.correlation.create(CHAT);

    let response = app(h.state.clone())
        .oneshot(get("/github_redirect?code=abc&state=forged"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "not_found");
    assert!(h.credentials.is_empty());
}

#[tokio::test]
async fn failed_exchange_notifies_conversation() {
    let mut h = harness();
    let state = h.correlation.create(CHAT);
    let uri = format!("/github_redirect?code=bad&state={}", state.as_str());

    let response = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["code"], "upstream_error");
    assert!(h.credentials.is_empty());
    let notice = h.queue.next().await.unwrap();
    assert_eq!(notice.conversation, CHAT);
    assert_eq!(notice.text, gs_core::commands::CONNECT_FAILED);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let h = harness();
    let request = Request::builder()
        .uri("/github_redirect")
        .header(HEADER_NAME, "req_from_proxy")
        .body(Body::empty())
        .unwrap();

    let response = app(h.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.headers()[HEADER_NAME], "req_from_proxy");
    assert_eq!(json_body(response).await["request_id"], "req_from_proxy");
}

#[tokio::test]
async fn index_points_at_bot() {
    let h = harness();
    let response = app(h.state.clone()).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains(BOT_LINK));
}

#[tokio::test]
async fn authorize_link_round_trips_through_callback() {
    let mut h = harness();
    let reply = h
        .state
        .commands
        .handle(&InboundEvent::new(CHAT, Some("authorize".to_string())))
        .await;
    let link = reply.text.trim().rsplit('\n').next().unwrap();
    let state = link.rsplit('=').next().unwrap();
    let uri = format!("/github_redirect?code=xyz&state={state}");

    let response = app(h.state.clone()).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(h.credentials.get(CHAT).unwrap().as_deref(), Some("token-xyz"));
    assert_eq!(h.queue.next().await.unwrap().text, gs_core::commands::CONNECTED);
}
