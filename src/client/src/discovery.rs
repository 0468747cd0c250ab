use crate::config_manager::Config;
use crate::error::{TailError, TailResult};
use async_trait::async_trait;
use ghtail_common::types::DiscoveredRun;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lists the most recent runs of a workflow file, newest first.
#[async_trait]
pub trait RunLister: Send + Sync {
    async fn list_recent_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        limit: u8,
    ) -> TailResult<Vec<DiscoveredRun>>;
}

/// Watches a workflow file for new runs that are still going.
pub struct RunDiscoverer {
    lister: Arc<dyn RunLister>,
    owner: String,
    repo: String,
    workflow_file: String,
    interval: Duration,
    page_size: u8,
    seen: HashSet<u64>,
}

impl RunDiscoverer {
    pub fn new(
        lister: Arc<dyn RunLister>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        workflow_file: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            lister,
            owner: owner.into(),
            repo: repo.into(),
            workflow_file: workflow_file.into(),
            interval: config.run_poll_interval(),
            page_size: config.run_poll_page_size.clamp(1, 100) as u8,
            seen: HashSet::new(),
        }
    }

    /// Polls until `token` fires, sending every newly seen unfinished run to `tx`.
    pub async fn run(
        &mut self,
        token: &CancellationToken,
        tx: &mpsc::Sender<DiscoveredRun>,
    ) -> TailResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("run discovery cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let runs = self
                .lister
                .list_recent_runs(&self.owner, &self.repo, &self.workflow_file, self.page_size)
                .await?;

            for run in self.unseen_active(runs) {
                info!(run = %run.identity, number = run.number, name = %run.name, "new run");
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    sent = tx.send(run) => sent.map_err(|_| TailError::OutputClosed)?,
                }
            }
        }
    }

    /// Walks `runs` oldest first. Every run is marked seen, only unfinished ones are returned.
    fn unseen_active(&mut self, runs: Vec<DiscoveredRun>) -> Vec<DiscoveredRun> {
        runs.into_iter()
            .rev()
            .filter(|run| self.seen.insert(run.identity.run_id))
            .filter(|run| !run.is_completed())
            .collect()
    }
}
