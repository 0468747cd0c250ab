use crate::error::{TailError, TailResult};
use crate::status::state::{CorrelationState, JobStatusEntry};
use async_trait::async_trait;
use ghtail_common::types::{RunIdentity, StatusReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read side of the polling API.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, run: &RunIdentity) -> TailResult<StatusReport>;
}

/// Refreshes a [`CorrelationState`] from the polling API.
#[derive(Clone)]
pub struct StatusTracker {
    source: Arc<dyn StatusSource>,
}

impl StatusTracker {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self { source }
    }

    /// Fetches the run's jobs, run record and check runs and folds them into `state`.
    ///
    /// Nothing is written when any fetch fails or `token` fires first.
    pub async fn refresh(
        &self,
        token: &CancellationToken,
        run: &RunIdentity,
        state: &CorrelationState,
    ) -> TailResult<()> {
        let report = tokio::select! {
            _ = token.cancelled() => return Err(TailError::Cancelled),
            report = self.source.fetch_status(run) => report?,
        };
        let entries = index_by_external_id(&report);
        debug!(
            run = %run,
            status = %report.run.status,
            jobs = report.jobs.len(),
            indexed = entries.len(),
            "status refreshed"
        );
        state.apply_status(report.run, report.jobs, entries).await;
        Ok(())
    }
}

/// Pairs each job with its check run and keys the pair by the check run's
/// external id. Jobs without a check run, or whose check run has no
/// external id, are skipped.
pub fn index_by_external_id(report: &StatusReport) -> Vec<(String, JobStatusEntry)> {
    let check_runs: HashMap<u64, _> = report
        .check_runs
        .iter()
        .map(|check_run| (check_run.id, check_run))
        .collect();

    report
        .jobs
        .iter()
        .filter_map(|job| {
            let Some(check_run) = check_runs.get(&job.id) else {
                debug!(job = %job.name, id = job.id, "no check run for job yet");
                return None;
            };
            let Some(external_id) = check_run.external_id.clone() else {
                debug!(job = %job.name, id = job.id, "check run has no external id");
                return None;
            };
            Some((
                external_id,
                JobStatusEntry {
                    job: job.clone(),
                    check_run: (*check_run).clone(),
                },
            ))
        })
        .collect()
}
