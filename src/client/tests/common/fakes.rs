use async_trait::async_trait;
use ghtail_client::correlator::{Correlator, SessionSettings};
use ghtail_client::resolver::{PageFetcher, ResolverSettings, StreamUrlResolver};
use ghtail_client::status::{StatusSource, StatusTracker};
use ghtail_client::{TailError, TailResult};
use ghtail_common::types::{
    CheckRunRecord, JobRecord, RunIdentity, RunSnapshot, StatusReport, StepRecord,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WEB_BASE_URL: &str = "https://github.com";
pub const AUTHENTICATED_URL: &str = "https://pipelines.example.net/authenticated";
pub const JOB_RECORD_ID: &str = "record-1";
pub const SECOND_JOB_RECORD_ID: &str = "record-2";

pub fn run_identity() -> RunIdentity {
    RunIdentity::new("octo", "repo", 42)
}

/// Status source serving one job `build` whose check run carries `record-1`.
///
/// Calls past `stall_after` never answer.
pub struct FakeStatus {
    report: Mutex<StatusReport>,
    calls: AtomicUsize,
    stall_after: AtomicUsize,
}

impl FakeStatus {
    fn serving(report: StatusReport) -> Arc<Self> {
        Arc::new(Self {
            report: Mutex::new(report),
            calls: AtomicUsize::new(0),
            stall_after: AtomicUsize::new(usize::MAX),
        })
    }

    pub fn running() -> Arc<Self> {
        Self::serving(report("in_progress"))
    }

    /// Adds a second running job `test` (id 2, `record-2`).
    pub fn running_two_jobs() -> Arc<Self> {
        let mut report = report("in_progress");
        report.jobs.push(JobRecord {
            id: 2,
            name: "test".to_string(),
            status: "in_progress".to_string(),
            steps: vec![StepRecord {
                number: 1,
                name: "unit".to_string(),
                status: "in_progress".to_string(),
            }],
        });
        report.check_runs.push(CheckRunRecord {
            id: 2,
            external_id: Some(SECOND_JOB_RECORD_ID.to_string()),
        });
        Self::serving(report)
    }

    pub fn completed() -> Arc<Self> {
        Self::serving(report("completed"))
    }

    pub fn stall_after(&self, calls: usize) {
        self.stall_after.store(calls, Ordering::SeqCst);
    }

    pub fn complete_job(&self, name: &str) {
        let mut report = self.report.lock().unwrap();
        for job in report.jobs.iter_mut().filter(|job| job.name == name) {
            complete(job);
        }
    }

    pub fn complete_all(&self) {
        let mut report = self.report.lock().unwrap();
        report.run.status = "completed".to_string();
        report.jobs.iter_mut().for_each(complete);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn complete(job: &mut JobRecord) {
    job.status = "completed".to_string();
    for step in &mut job.steps {
        step.status = "completed".to_string();
    }
}

#[async_trait]
impl StatusSource for FakeStatus {
    async fn fetch_status(&self, _run: &RunIdentity) -> TailResult<StatusReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.stall_after.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let report = self.report.lock().unwrap().clone();
        Ok(report)
    }
}

fn report(status: &str) -> StatusReport {
    let step_status = |number: i64| {
        if status == "completed" || number == 1 {
            "completed"
        } else {
            "in_progress"
        }
    };
    StatusReport {
        run: RunSnapshot {
            status: status.to_string(),
            name: "CI".to_string(),
            number: 12,
            started_at: None,
            check_suite_id: 5,
        },
        jobs: vec![JobRecord {
            id: 1,
            name: "build".to_string(),
            status: status.to_string(),
            steps: vec![
                StepRecord {
                    number: 1,
                    name: "checkout".to_string(),
                    status: step_status(1).to_string(),
                },
                StepRecord {
                    number: 2,
                    name: "compile".to_string(),
                    status: step_status(2).to_string(),
                },
            ],
        }],
        check_runs: vec![CheckRunRecord {
            id: 1,
            external_id: Some(JOB_RECORD_ID.to_string()),
        }],
    }
}

/// Serves the three discovery documents.
///
/// The job page answers `pending_pages` times without a handle before it
/// hands one out; the authenticated document fails `handle_failures` times.
pub struct FakeWeb {
    ws_url: String,
    concluded: bool,
    concluded_jobs: Mutex<Vec<String>>,
    requested_jobs: Mutex<Vec<String>>,
    delay: Duration,
    pending_pages: AtomicUsize,
    handle_failures: AtomicUsize,
    job_page_calls: AtomicUsize,
    handle_calls: AtomicUsize,
}

impl FakeWeb {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            concluded: false,
            concluded_jobs: Mutex::new(Vec::new()),
            requested_jobs: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            pending_pages: AtomicUsize::new(0),
            handle_failures: AtomicUsize::new(0),
            job_page_calls: AtomicUsize::new(0),
            handle_calls: AtomicUsize::new(0),
        }
    }

    pub fn concluded(mut self) -> Self {
        self.concluded = true;
        self
    }

    pub fn conclude_job(&self, name: &str) {
        self.concluded_jobs.lock().unwrap().push(name.to_string());
    }

    /// Job names of every job page fetched, in order.
    pub fn requested_jobs(&self) -> Vec<String> {
        self.requested_jobs.lock().unwrap().clone()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_pending_pages(self, count: usize) -> Self {
        self.pending_pages.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_handle_failures(self, count: usize) -> Self {
        self.handle_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn job_page_calls(&self) -> usize {
        self.job_page_calls.load(Ordering::SeqCst)
    }

    pub fn handle_calls(&self) -> usize {
        self.handle_calls.load(Ordering::SeqCst)
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PageFetcher for FakeWeb {
    async fn fetch(&self, url: &str) -> TailResult<String> {
        if let Some((_, job)) = url.split_once("/graph/job/") {
            self.job_page_calls.fetch_add(1, Ordering::SeqCst);
            self.requested_jobs.lock().unwrap().push(job.to_string());
            tokio::time::sleep(self.delay).await;
            let job_concluded = self.concluded_jobs.lock().unwrap().iter().any(|name| name == job);
            if self.concluded || job_concluded {
                return Ok(r#"<streaming-graph-job data-concluded="true"></streaming-graph-job>"#
                    .to_string());
            }
            if Self::take_one(&self.pending_pages) {
                return Ok("<streaming-graph-job data-concluded=\"false\"></streaming-graph-job>"
                    .to_string());
            }
            return Ok(
                r#"<streaming-graph-job data-concluded="false" data-streaming-url="/octo/repo/live?x=1&amp;y=2"></streaming-graph-job>"#
                    .to_string(),
            );
        }

        if url == format!("{}/octo/repo/live?x=1&y=2", WEB_BASE_URL) {
            self.handle_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_one(&self.handle_failures) {
                return Err(TailError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                });
            }
            return Ok(json!({"success": true, "data": {"authenticated_url": AUTHENTICATED_URL}})
                .to_string());
        }

        if url == AUTHENTICATED_URL {
            return Ok(json!({"logStreamWebSocketUrl": self.ws_url}).to_string());
        }

        Err(TailError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub fn resolver_settings(attempts: usize) -> ResolverSettings {
    ResolverSettings {
        web_base_url: WEB_BASE_URL.to_string(),
        attempts,
        retry_delay: Duration::from_millis(10),
    }
}

pub fn session_settings() -> SessionSettings {
    SessionSettings {
        status_refresh_interval: Duration::from_millis(50),
        startup_poll_interval: Duration::from_millis(10),
        event_buffer: 16,
        report_already_completed: false,
    }
}

pub fn correlator(status: Arc<FakeStatus>, web: Arc<FakeWeb>, settings: SessionSettings) -> Correlator {
    Correlator::new(
        StatusTracker::new(status),
        Arc::new(StreamUrlResolver::new(web, resolver_settings(5))),
        settings,
    )
}
