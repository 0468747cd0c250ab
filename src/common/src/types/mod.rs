pub mod output;
pub mod run;

pub use output::OutputEvent;
pub use run::{
    CheckRunRecord, DiscoveredRun, JobRecord, RunIdentity, RunSnapshot, RunSummary, StatusReport,
    StepRecord,
};
