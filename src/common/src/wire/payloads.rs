use serde::{Deserialize, Serialize};

/// Console output pushed by `WatchRunAsync`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogBatch {
    #[serde(rename = "RunId")]
    pub internal_run_id: i64,
    pub timeline_id: String,
    /// Matches the `external_id` of the job's check run.
    pub timeline_record_id: String,
    pub step_record_id: String,
    pub start_line: i64,
    pub lines: Vec<String>,
}

/// Step progress pushed by `WatchRunStepsProgressAsync`.
///
/// The hub delivers these as arrays: one invocation argument is a
/// `Vec<StepProgressUpdate>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepProgressUpdate {
    #[serde(rename = "RunId")]
    pub internal_run_id: i64,
    pub timeline_id: String,
    pub parent_record_id: String,
    pub step_record_id: String,
    pub step_number: i64,
    pub change_id: i64,
    pub step_completed: bool,
}
