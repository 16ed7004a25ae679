pub mod middleware;
pub mod routes;

use axum::Router;
use gs_bot::Outbox;
use gs_core::Commands;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<Commands>,
    pub outbox: Outbox,
    /// Where the browser lands after a successful authorization.
    pub bot_link: String,
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "callback server listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
