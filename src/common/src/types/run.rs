use crate::constants::{STATUS_COMPLETED, STATUS_IN_PROGRESS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Key of a tailing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
    pub owner: String,
    pub repo: String,
    pub run_id: u64,
}

impl RunIdentity {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, run_id: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            run_id,
        }
    }
}

impl fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.run_id)
    }
}

/// Latest fetched state of a workflow run. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub status: String,
    pub name: String,
    pub number: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub check_suite_id: u64,
}

impl RunSnapshot {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// What a finished session reports about its run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub workflow: String,
    pub number: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Time since the run started, `None` when unknown or in the future.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .and_then(|started_at| (now - started_at).to_std().ok())
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_at(Utc::now())
    }
}

impl From<&RunSnapshot> for RunSummary {
    fn from(run: &RunSnapshot) -> Self {
        Self {
            workflow: run.name.clone(),
            number: run.number,
            started_at: run.started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub number: i64,
    pub name: String,
    pub status: String,
}

impl StepRecord {
    pub fn is_in_progress(&self) -> bool {
        self.status == STATUS_IN_PROGRESS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub steps: Vec<StepRecord>,
}

impl JobRecord {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// The subset of a check run needed to cross-reference push-protocol ids.
///
/// A job's check run shares the job's id, and its `external_id` is the
/// timeline record id the push backend tags console output with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRunRecord {
    pub id: u64,
    pub external_id: Option<String>,
}

/// Everything one status refresh fetches from the polling API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub run: RunSnapshot,
    pub jobs: Vec<JobRecord>,
    pub check_runs: Vec<CheckRunRecord>,
}

/// A run surfaced by polling the runs of a workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredRun {
    pub identity: RunIdentity,
    pub name: String,
    pub number: u64,
    pub status: String,
}

impl DiscoveredRun {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}
