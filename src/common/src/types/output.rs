use crate::types::run::RunIdentity;
use serde::{Deserialize, Serialize};

/// One attributed batch of console lines. Emitted exactly once per received log batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub run: RunIdentity,
    pub job_name: String,
    pub step_name: String,
    pub step_number: i64,
    /// `true` when the step was guessed rather than resolved from the step id.
    pub assumed_step_name: bool,
    pub lines: Vec<String>,
}

impl OutputEvent {
    /// Step name as shown to the operator, with a `*` marking a guessed step.
    pub fn display_step_name(&self) -> String {
        if self.assumed_step_name {
            format!("{}*", self.step_name)
        } else {
            self.step_name.clone()
        }
    }
}
