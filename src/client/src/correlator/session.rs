use crate::config_manager::Config;
use crate::correlator::supervisor::TaskGroup;
use crate::error::{TailError, TailResult};
use crate::push;
use crate::resolver::StreamUrlResolver;
use crate::status::{CorrelationState, StatusTracker};
use ghtail_common::constants::{CONSOLE_OUTPUT_TARGET, STEP_PROGRESS_TARGET};
use ghtail_common::types::{OutputEvent, RunIdentity, RunSummary};
use ghtail_common::wire::{LogBatch, StepProgressUpdate};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every job of the run completed.
    Completed(RunSummary),
    /// The run had already finished when the session started.
    NothingToTail(RunSummary),
}

impl SessionOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            SessionOutcome::Completed(summary) | SessionOutcome::NothingToTail(summary) => summary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub status_refresh_interval: Duration,
    pub startup_poll_interval: Duration,
    pub event_buffer: usize,
    pub report_already_completed: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            status_refresh_interval: config.status_refresh_interval(),
            startup_poll_interval: config.startup_poll_interval(),
            event_buffer: config.event_buffer.max(1) as usize,
            report_already_completed: config.report_already_completed,
        }
    }
}

/// Tails one run: joins the live console output with the run's status and
/// emits one [`OutputEvent`] per received log batch.
#[derive(Clone)]
pub struct Correlator {
    tracker: StatusTracker,
    resolver: Arc<StreamUrlResolver>,
    settings: SessionSettings,
}

impl Correlator {
    pub fn new(
        tracker: StatusTracker,
        resolver: Arc<StreamUrlResolver>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            tracker,
            resolver,
            settings,
        }
    }

    pub async fn tail(
        &self,
        token: &CancellationToken,
        run: &RunIdentity,
        out: mpsc::Sender<OutputEvent>,
    ) -> TailResult<SessionOutcome> {
        let state = CorrelationState::new();
        self.tracker.refresh(token, run, &state).await?;

        if state.run_completed().await {
            return Ok(self.already_completed(run, &state).await);
        }

        let Some(job_name) = self.wait_for_active_job(token, run, &state).await? else {
            return Ok(self.already_completed(run, &state).await);
        };
        info!(run = %run, job = %job_name, "tailing run");

        let session = Arc::new(Session {
            run: run.clone(),
            job_name,
            state: state.clone(),
            tracker: self.tracker.clone(),
            resolver: self.resolver.clone(),
            settings: self.settings.clone(),
        });

        let mut group = TaskGroup::new(token.child_token());
        let (batch_tx, batch_rx) = mpsc::channel(self.settings.event_buffer);

        group.spawn(
            "step_progress",
            session.clone().watch_step_progress(group.token().clone()),
        );
        group.spawn(
            "console_output",
            session
                .clone()
                .watch_console_output(group.token().clone(), batch_tx),
        );
        group.spawn(
            "correlation",
            session.correlate(group.token().clone(), batch_rx, out),
        );

        match group.wait().await {
            Ok(()) | Err(TailError::JobComplete) => {
                info!(run = %run, "run completed");
                Ok(SessionOutcome::Completed(
                    state.run_summary().await.unwrap_or_default(),
                ))
            }
            Err(e) => Err(e),
        }
    }

    async fn already_completed(
        &self,
        run: &RunIdentity,
        state: &CorrelationState,
    ) -> SessionOutcome {
        info!(run = %run, "run already completed");
        let summary = state.run_summary().await.unwrap_or_default();
        if self.settings.report_already_completed {
            SessionOutcome::NothingToTail(summary)
        } else {
            SessionOutcome::Completed(summary)
        }
    }

    /// Polls until some job is active. `None` when every job finished first.
    async fn wait_for_active_job(
        &self,
        token: &CancellationToken,
        run: &RunIdentity,
        state: &CorrelationState,
    ) -> TailResult<Option<String>> {
        loop {
            if state.all_jobs_completed().await {
                return Ok(None);
            }
            if let Some(job_name) = state.first_active_job_name().await {
                return Ok(Some(job_name));
            }

            debug!(run = %run, "waiting for a job to start");
            tokio::select! {
                _ = token.cancelled() => return Err(TailError::Cancelled),
                _ = tokio::time::sleep(self.settings.startup_poll_interval) => {}
            }
            self.tracker.refresh(token, run, state).await?;
        }
    }
}

struct Session {
    run: RunIdentity,
    /// Job picked at startup; used when no job is active anymore.
    job_name: String,
    state: CorrelationState,
    tracker: StatusTracker,
    resolver: Arc<StreamUrlResolver>,
    settings: SessionSettings,
}

impl Session {
    /// Streams `target` into `tx`, reconnecting on a fresh URL after every reset.
    async fn stream<T>(
        &self,
        token: &CancellationToken,
        target: &'static str,
        tx: &mpsc::Sender<T>,
    ) -> TailResult<()>
    where
        T: DeserializeOwned + Send,
    {
        loop {
            let job_name = self.resolution_job().await;
            let url = self.resolver.resolve(token, &self.run, &job_name).await?;
            match push::connect(token, &url, target, tx).await {
                Err(e) if e.is_connection_reset() && !token.is_cancelled() => {
                    warn!(hub_target = target, error = %e, "push connection reset, reconnecting");
                }
                result => return result,
            }
        }
    }

    /// The lowest-id job still running, else the job picked at startup.
    async fn resolution_job(&self) -> String {
        self.state
            .first_active_job_name()
            .await
            .unwrap_or_else(|| self.job_name.clone())
    }

    async fn watch_step_progress(self: Arc<Self>, token: CancellationToken) -> TailResult<()> {
        let (tx, mut rx) = mpsc::channel::<Vec<StepProgressUpdate>>(self.settings.event_buffer);
        let stream = self.stream(&token, STEP_PROGRESS_TARGET, &tx);
        tokio::pin!(stream);
        let mut stream_done = false;

        let period = self.settings.status_refresh_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return Err(TailError::Cancelled),

                result = &mut stream, if !stream_done => {
                    result?;
                    stream_done = true;
                    debug!("step progress stream closed");
                }

                Some(updates) = rx.recv() => {
                    self.state.record_step_progress(&updates).await;
                }

                _ = ticker.tick() => {
                    self.tracker.refresh(&token, &self.run, &self.state).await?;
                    if self.state.all_jobs_completed().await {
                        return Err(TailError::JobComplete);
                    }
                }
            }
        }
    }

    async fn watch_console_output(
        self: Arc<Self>,
        token: CancellationToken,
        tx: mpsc::Sender<LogBatch>,
    ) -> TailResult<()> {
        self.stream(&token, CONSOLE_OUTPUT_TARGET, &tx).await?;
        debug!("console output stream closed");
        Ok(())
    }

    async fn correlate(
        self: Arc<Self>,
        token: CancellationToken,
        mut batches: mpsc::Receiver<LogBatch>,
        out: mpsc::Sender<OutputEvent>,
    ) -> TailResult<()> {
        loop {
            let batch = tokio::select! {
                _ = token.cancelled() => return Err(TailError::Cancelled),
                batch = batches.recv() => batch,
            };
            let Some(batch) = batch else {
                return Ok(());
            };

            let event = self
                .state
                .attribute(&batch)
                .await
                .into_event(self.run.clone(), batch.lines);

            tokio::select! {
                _ = token.cancelled() => return Err(TailError::Cancelled),
                sent = out.send(event) => sent.map_err(|_| TailError::OutputClosed)?,
            }
        }
    }
}
