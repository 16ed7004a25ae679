//! Lane-based command dispatch.
//!
//! Ingestion classifies every inbound event into one of four lanes and hands
//! it to that lane's bounded queue. Each lane has its own consumer task, so a
//! slow report never holds up `start`, `authorize` or `cancel`. Within a lane
//! events are handled in arrival order. Replies go to the shared [`Outbox`].

use crate::error::DispatchError;
use crate::outbound::Outbox;
use crate::transport::ChatTransport;
use async_trait::async_trait;
use futures::FutureExt;
use gs_core::commands::INTERNAL_FAILURE;
use gs_core::{Commands, InboundEvent, Lane, OutboundMessage};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait LaneHandler: Send + Sync + 'static {
    async fn handle(&self, lane: Lane, event: &InboundEvent) -> OutboundMessage;
}

#[async_trait]
impl LaneHandler for Commands {
    async fn handle(&self, _lane: Lane, event: &InboundEvent) -> OutboundMessage {
        Commands::handle(self, event).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub lane_capacity: usize,
    /// How long ingestion waits on a full lane before dropping the event.
    pub send_timeout: Duration,
}

struct Lanes {
    start: mpsc::Sender<InboundEvent>,
    authorize: mpsc::Sender<InboundEvent>,
    report: mpsc::Sender<InboundEvent>,
    cancel: mpsc::Sender<InboundEvent>,
}

impl Lanes {
    fn get(&self, lane: Lane) -> &mpsc::Sender<InboundEvent> {
        match lane {
            Lane::Start => &self.start,
            Lane::Authorize => &self.authorize,
            Lane::Report => &self.report,
            Lane::Cancel => &self.cancel,
        }
    }
}

pub struct CommandRouter {
    lanes: Lanes,
    send_timeout: Duration,
}

impl CommandRouter {
    /// Starts one consumer per lane. The workers stop once the router is
    /// dropped and their queues are empty.
    pub fn spawn<H: LaneHandler>(
        handler: Arc<H>,
        outbox: &Outbox,
        config: RouterConfig,
    ) -> (Self, JoinSet<()>) {
        let mut workers = JoinSet::new();
        let mut open = |lane: Lane| {
            let (sender, receiver) = mpsc::channel(config.lane_capacity);
            workers.spawn(run_lane(lane, handler.clone(), receiver, outbox.clone()));
            sender
        };
        let lanes = Lanes {
            start: open(Lane::Start),
            authorize: open(Lane::Authorize),
            report: open(Lane::Report),
            cancel: open(Lane::Cancel),
        };
        let router = Self {
            lanes,
            send_timeout: config.send_timeout,
        };
        (router, workers)
    }

    pub async fn dispatch(&self, event: InboundEvent) -> Result<Lane, DispatchError> {
        let lane = event.lane();
        match self.lanes.get(lane).send_timeout(event, self.send_timeout).await {
            Ok(()) => Ok(lane),
            Err(SendTimeoutError::Timeout(_)) => Err(DispatchError::Full { lane }),
            Err(SendTimeoutError::Closed(_)) => Err(DispatchError::Closed { lane }),
        }
    }

    /// Reads updates from `transport` until `shutdown` fires.
    pub async fn ingest(&self, transport: Arc<dyn ChatTransport>, shutdown: CancellationToken) {
        loop {
            let batch = tokio::select! {
                () = shutdown.cancelled() => break,
                batch = transport.poll() => batch,
            };
            match batch {
                Ok(events) => {
                    for event in events {
                        let conversation = event.conversation;
                        if let Err(err) = self.dispatch(event).await {
                            warn!(%conversation, error = %err, "dropped inbound event");
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "polling updates failed");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }
        debug!("ingestion stopped");
    }
}

async fn run_lane<H: LaneHandler>(
    lane: Lane,
    handler: Arc<H>,
    mut receiver: mpsc::Receiver<InboundEvent>,
    outbox: Outbox,
) {
    while let Some(event) = receiver.recv().await {
        let reply = AssertUnwindSafe(handler.handle(lane, &event))
            .catch_unwind()
            .await;
        let message = reply.unwrap_or_else(|_| {
            error!(%lane, conversation = %event.conversation, "lane handler panicked");
            OutboundMessage::plain(event.conversation, INTERNAL_FAILURE)
        });
        if outbox.send(message).await.is_err() {
            debug!(%lane, "outbound queue closed");
            break;
        }
    }
}
