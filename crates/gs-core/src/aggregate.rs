//! Fan-out/fan-in over a user's repositories.
//!
//! One task is spawned per repository. The reducer merges partial results as
//! they complete but only returns once the join set has drained, so callers
//! never observe a partial report. A failed or timed-out fetch contributes
//! nothing and is counted in [`Aggregation::failed`].

use crate::error::AggregationError;
use crate::host::RepoHost;
use crate::types::CategoryCount;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub totals: CategoryCount,
    pub repos: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationEngine {
    fetch_timeout: Duration,
}

impl AggregationEngine {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }

    pub async fn aggregate(
        &self,
        host: Arc<dyn RepoHost>,
        user: &str,
        repos: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AggregationError> {
        let total = repos.len();
        let mut tasks = JoinSet::new();
        for repo in repos {
            let host = host.clone();
            let user = user.to_string();
            let timeout = self.fetch_timeout;
            tasks.spawn(async move {
                match tokio::time::timeout(timeout, host.languages(&user, &repo)).await {
                    Ok(Ok(counts)) => Some(counts),
                    Ok(Err(err)) => {
                        warn!(user = %user, repo = %repo, error = %err, "language fetch failed");
                        None
                    }
                    Err(_) => {
                        warn!(user = %user, repo = %repo, ?timeout, "language fetch timed out");
                        None
                    }
                }
            });
        }

        let mut totals = CategoryCount::new();
        let mut failed = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    debug!(user = %user, "aggregation cancelled");
                    return Err(AggregationError::Cancelled);
                }
                next = tasks.join_next() => next,
            };
            let Some(joined) = next else {
                break;
            };
            match joined {
                Ok(Some(counts)) => merge(&mut totals, counts),
                Ok(None) => failed += 1,
                Err(err) => {
                    warn!(user = %user, error = %err, "language fetch task did not complete");
                    failed += 1;
                }
            }
        }

        info!(
            user = %user,
            repos = total,
            failed,
            categories = totals.len(),
            "aggregation finished"
        );
        Ok(Aggregation {
            totals,
            repos: total,
            failed,
        })
    }
}

/// Adds `counts` into `totals`; names are compared exactly (case-sensitive).
pub fn merge(totals: &mut CategoryCount, counts: CategoryCount) {
    for (name, bytes) in counts {
        let entry = totals.entry(name).or_insert(0);
        *entry = entry.saturating_add(bytes);
    }
}
