use crate::correlator::session::{Correlator, SessionOutcome};
use crate::error::TailResult;
use ghtail_common::types::{OutputEvent, RunIdentity};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Result of one finished session.
#[derive(Debug)]
pub struct SessionEnded {
    pub run: RunIdentity,
    pub result: TailResult<SessionOutcome>,
}

struct ActiveSession {
    run: RunIdentity,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps at most one session alive, moving on to the newest run on request.
pub struct SessionSwitcher {
    correlator: Arc<Correlator>,
    root: CancellationToken,
    out: mpsc::Sender<OutputEvent>,
    reports: mpsc::UnboundedSender<SessionEnded>,
    active: Option<ActiveSession>,
}

impl SessionSwitcher {
    pub fn new(
        correlator: Correlator,
        root: CancellationToken,
        out: mpsc::Sender<OutputEvent>,
        reports: mpsc::UnboundedSender<SessionEnded>,
    ) -> Self {
        Self {
            correlator: Arc::new(correlator),
            root,
            out,
            reports,
            active: None,
        }
    }

    pub fn active_run(&self) -> Option<&RunIdentity> {
        self.active
            .as_ref()
            .filter(|active| !active.handle.is_finished())
            .map(|active| &active.run)
    }

    /// Stops the current session, waits for it to unwind, then starts tailing `run`.
    pub async fn switch_to(&mut self, run: RunIdentity) {
        if self.active_run() == Some(&run) {
            debug!(run = %run, "already tailing run");
            return;
        }
        self.stop_active().await;

        let token = self.root.child_token();
        let correlator = self.correlator.clone();
        let out = self.out.clone();
        let reports = self.reports.clone();
        let session_token = token.clone();
        let session_run = run.clone();
        let span = info_span!("session", run = %run);

        let handle = tokio::spawn(
            async move {
                let result = correlator.tail(&session_token, &session_run, out).await;
                match &result {
                    Ok(outcome) => info!(?outcome, "session finished"),
                    Err(e) if e.is_benign() => info!(reason = %e, "session ended"),
                    Err(e) => error!(error = %e, "session failed"),
                }
                if reports
                    .send(SessionEnded {
                        run: session_run,
                        result,
                    })
                    .is_err()
                {
                    debug!("no one is listening for session reports");
                }
            }
            .instrument(span),
        );

        self.active = Some(ActiveSession { run, token, handle });
    }

    /// Cancels and joins the active session, if any.
    pub async fn shutdown(&mut self) {
        self.stop_active().await;
    }

    async fn stop_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        debug!(run = %active.run, "stopping session");
        active.token.cancel();
        if let Err(e) = active.handle.await {
            warn!(run = %active.run, error = %e, "session task did not shut down cleanly");
        }
    }
}
