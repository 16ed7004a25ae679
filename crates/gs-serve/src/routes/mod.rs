pub mod callback;
pub mod error;

use crate::AppState;
use crate::middleware::request_id::{MakeRequestUlid, header_name, request_span};
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub const CALLBACK_PATH: &str = "/github_redirect";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(CALLBACK_PATH, get(callback::github_redirect))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name(), MakeRequestUlid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::new(header_name())),
        )
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> String {
    format!(
        "ghstat reports the languages of your GitHub repositories.\nTalk to the bot: {}\n",
        state.bot_link
    )
}
