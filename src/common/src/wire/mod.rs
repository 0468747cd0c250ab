//! Wire types of the real-time push backend.

pub mod framing;
pub mod message;
pub mod payloads;

pub use framing::{handshake_frame, split_frames, subscribe_frame, RECORD_SEPARATOR};
pub use message::{InboundMessage, MessageType};
pub use payloads::{LogBatch, StepProgressUpdate};
