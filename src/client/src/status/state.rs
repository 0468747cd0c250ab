use crate::status::attribution::{attribute, Attribution};
use ghtail_common::types::{CheckRunRecord, JobRecord, RunSnapshot, RunSummary};
use ghtail_common::wire::{LogBatch, StepProgressUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A job paired with its check run, keyed by the check run's external id.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusEntry {
    pub job: JobRecord,
    pub check_run: CheckRunRecord,
}

#[derive(Debug, Default)]
struct Inner {
    run: Option<RunSnapshot>,
    jobs: Vec<JobRecord>,
    statuses: HashMap<String, JobStatusEntry>,
    step_numbers: HashMap<String, i64>,
}

/// Shared view of a run used to attribute console output.
///
/// Written by the status refresher and the step-progress task, read by the
/// correlation loop. All access goes through one async mutex.
#[derive(Debug, Clone, Default)]
pub struct CorrelationState {
    inner: Arc<Mutex<Inner>>,
}

impl CorrelationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the run snapshot and job list, and overwrites the entry of
    /// every indexed job.
    pub(crate) async fn apply_status(
        &self,
        run: RunSnapshot,
        jobs: Vec<JobRecord>,
        entries: Vec<(String, JobStatusEntry)>,
    ) {
        let mut inner = self.inner.lock().await;
        inner.run = Some(run);
        inner.jobs = jobs;
        for (external_id, entry) in entries {
            inner.statuses.insert(external_id, entry);
        }
    }

    /// Maps each step record id to its step number. Later updates win.
    pub async fn record_step_progress(&self, updates: &[StepProgressUpdate]) {
        let mut inner = self.inner.lock().await;
        for update in updates {
            inner
                .step_numbers
                .insert(update.step_record_id.clone(), update.step_number);
        }
    }

    pub async fn attribute(&self, batch: &LogBatch) -> Attribution {
        let inner = self.inner.lock().await;
        let job = inner
            .statuses
            .get(&batch.timeline_record_id)
            .map(|entry| &entry.job);
        let step_number = inner.step_numbers.get(&batch.step_record_id).copied();
        attribute(job, step_number)
    }

    /// Workflow name, run number and start time of the last fetched snapshot.
    pub async fn run_summary(&self) -> Option<RunSummary> {
        self.inner.lock().await.run.as_ref().map(RunSummary::from)
    }

    /// `true` once the run has at least one job and every job completed.
    pub async fn all_jobs_completed(&self) -> bool {
        let inner = self.inner.lock().await;
        !inner.jobs.is_empty() && inner.jobs.iter().all(JobRecord::is_completed)
    }

    /// `true` when the run itself reports completion.
    pub async fn run_completed(&self) -> bool {
        self.inner
            .lock()
            .await
            .run
            .as_ref()
            .is_some_and(RunSnapshot::is_completed)
    }

    /// Name of the lowest-id job that has not completed yet.
    pub async fn first_active_job_name(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .jobs
            .iter()
            .filter(|job| !job.is_completed())
            .min_by_key(|job| job.id)
            .map(|job| job.name.clone())
    }

    #[cfg(test)]
    pub(crate) async fn indexed(&self) -> (HashMap<String, JobStatusEntry>, HashMap<String, i64>) {
        let inner = self.inner.lock().await;
        (inner.statuses.clone(), inner.step_numbers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghtail_common::types::StepRecord;

    fn snapshot(status: &str) -> RunSnapshot {
        RunSnapshot {
            status: status.to_string(),
            name: "CI".to_string(),
            number: 1,
            started_at: None,
            check_suite_id: 9,
        }
    }

    fn job(id: u64, name: &str, status: &str) -> JobRecord {
        JobRecord {
            id,
            name: name.to_string(),
            status: status.to_string(),
            steps: vec![
                StepRecord {
                    number: 1,
                    name: "checkout".to_string(),
                    status: "completed".to_string(),
                },
                StepRecord {
                    number: 2,
                    name: "build".to_string(),
                    status: "in_progress".to_string(),
                },
            ],
        }
    }

    fn entry(job: JobRecord, external_id: &str) -> (String, JobStatusEntry) {
        let check_run = CheckRunRecord {
            id: job.id,
            external_id: Some(external_id.to_string()),
        };
        (external_id.to_string(), JobStatusEntry { job, check_run })
    }

    fn batch(timeline_record_id: &str, step_record_id: &str) -> LogBatch {
        LogBatch {
            timeline_record_id: timeline_record_id.to_string(),
            step_record_id: step_record_id.to_string(),
            lines: vec!["line".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_attribution_follows_step_progress() {
        let state = CorrelationState::new();
        let a = job(1, "A", "in_progress");
        state
            .apply_status(snapshot("in_progress"), vec![a.clone()], vec![entry(a, "X")])
            .await;

        let before = state.attribute(&batch("X", "S")).await;
        assert_eq!(before.step_name, "build");
        assert!(before.assumed_step_name);

        state
            .record_step_progress(&[StepProgressUpdate {
                step_record_id: "S".into(),
                step_number: 1,
                ..Default::default()
            }])
            .await;

        let after = state.attribute(&batch("X", "S")).await;
        assert_eq!(after.step_name, "checkout");
        assert_eq!(after.step_number, 1);
        assert!(!after.assumed_step_name);
    }

    #[tokio::test]
    async fn test_completion_requires_jobs() {
        let state = CorrelationState::new();
        state
            .apply_status(snapshot("queued"), vec![], vec![])
            .await;
        assert!(!state.all_jobs_completed().await);

        state
            .apply_status(
                snapshot("completed"),
                vec![job(1, "A", "completed"), job(2, "B", "completed")],
                vec![],
            )
            .await;
        assert!(state.all_jobs_completed().await);
        assert!(state.run_completed().await);

        let summary = state.run_summary().await.unwrap();
        assert_eq!(summary.workflow, "CI");
        assert_eq!(summary.number, 1);
    }

    #[tokio::test]
    async fn test_first_active_job_is_lowest_id() {
        let state = CorrelationState::new();
        state
            .apply_status(
                snapshot("in_progress"),
                vec![
                    job(30, "deploy", "queued"),
                    job(10, "lint", "completed"),
                    job(20, "test", "in_progress"),
                ],
                vec![],
            )
            .await;

        assert_eq!(state.first_active_job_name().await.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_later_step_updates_win() {
        let state = CorrelationState::new();
        let update = |number| StepProgressUpdate {
            step_record_id: "S".into(),
            step_number: number,
            ..Default::default()
        };
        state.record_step_progress(&[update(1), update(3)]).await;
        state.record_step_progress(&[update(4)]).await;

        let (_, step_numbers) = state.indexed().await;
        assert_eq!(step_numbers.get("S"), Some(&4));
        assert_eq!(step_numbers.len(), 1);
    }
}
