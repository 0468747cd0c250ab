pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_IN_PROGRESS: &str = "in_progress";

/// Placeholder for a job or step name that could not be attributed.
pub const UNKNOWN_NAME: &str = "?";

/// Hub method streaming console output batches.
pub const CONSOLE_OUTPUT_TARGET: &str = "WatchRunAsync";
/// Hub method streaming step progress updates.
pub const STEP_PROGRESS_TARGET: &str = "WatchRunStepsProgressAsync";

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_BASE_URL: &str = "https://github.com";
