pub mod config_manager;
pub mod correlator;
pub mod discovery;
pub mod error;
pub mod github;
pub mod push;
pub mod resolver;
pub mod status;

pub use error::{TailError, TailResult};
