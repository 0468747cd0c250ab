pub mod constants;
pub mod types;
pub mod wire;
