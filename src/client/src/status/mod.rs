mod attribution;
mod state;
mod tracker;

pub use attribution::{attribute, Attribution};
pub use state::{CorrelationState, JobStatusEntry};
pub use tracker::{index_by_external_id, StatusSource, StatusTracker};
