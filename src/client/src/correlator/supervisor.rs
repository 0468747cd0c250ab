use crate::error::{TailError, TailResult};
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

/// Runs a set of tasks that live and die together.
///
/// The first task to fail cancels the group token; every task is joined
/// before [`TaskGroup::wait`] returns that first error.
pub struct TaskGroup {
    tasks: JoinSet<TailResult<()>>,
    token: CancellationToken,
}

impl TaskGroup {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
        }
    }

    /// Token the group's tasks should select on.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = TailResult<()>> + Send + 'static,
    {
        self.tasks.spawn(task.instrument(info_span!("task", name)));
    }

    pub async fn wait(mut self) -> TailResult<()> {
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = joined
                .map_err(|e| TailError::Task(e.to_string()))
                .and_then(|result| result);

            if let Err(e) = result {
                if first_error.is_none() {
                    debug!(error = %e, "task failed, cancelling the rest of the group");
                    self.token.cancel();
                    first_error = Some(e);
                } else {
                    debug!(error = %e, "task ended after group cancellation");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
