//! Per-run tailing sessions and their supervision.

mod session;
mod supervisor;
mod switcher;

pub use session::{Correlator, SessionOutcome, SessionSettings};
pub use supervisor::TaskGroup;
pub use switcher::{SessionEnded, SessionSwitcher};
