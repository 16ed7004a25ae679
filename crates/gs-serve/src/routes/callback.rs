use crate::AppState;
use crate::middleware::request_id::request_id_of;
use crate::routes::error::map_error;
use axum::Extension;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use gs_core::{Commands, OutboundMessage};
use serde::Deserialize;
use tower_http::request_id::RequestId;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// OAuth redirect target. Binds the exchanged credential to the conversation
/// the state token was issued for, then sends the browser back to the bot.
pub async fn github_redirect(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let result = state
        .commands
        .complete_authorization(query.code.as_deref(), query.state.as_deref())
        .await;
    match result {
        Ok(notice) => {
            info!(conversation = %notice.conversation, "github account connected");
            notify(&state, notice).await;
            (StatusCode::MOVED_PERMANENTLY, [(LOCATION, state.bot_link.clone())]).into_response()
        }
        Err(err) => {
            warn!(error = %err, "authorization callback failed");
            if let Some(notice) = Commands::failure_notice(&err) {
                notify(&state, notice).await;
            }
            map_error(&err, request_id_of(&request_id)).into_response()
        }
    }
}

async fn notify(state: &AppState, notice: OutboundMessage) {
    let conversation = notice.conversation;
    if state.outbox.send(notice).await.is_err() {
        warn!(conversation = %conversation, "outbound queue closed, notice dropped");
    }
}
