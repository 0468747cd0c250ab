//! Client side of the real-time push backend.

mod connector;

pub use connector::connect;
