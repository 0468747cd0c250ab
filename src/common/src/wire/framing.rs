//! Record-separator framing of the JSON hub protocol.
//!
//! Every JSON record on the wire is terminated by the ASCII record separator
//! (0x1E). A single websocket message may carry several records back to back.

use crate::wire::message::{HandshakeRequest, MessageType, SubscribeRequest};

pub const RECORD_SEPARATOR: u8 = 0x1E;

const EMPTY_RECORD: &[u8] = b"{}";

fn terminate(mut record: String) -> String {
    record.push(RECORD_SEPARATOR as char);
    record
}

/// `{"protocol":"json","version":1}` followed by the separator.
pub fn handshake_frame() -> String {
    let request = HandshakeRequest {
        protocol: "json",
        version: 1,
    };
    // serializing a struct of plain fields cannot fail
    terminate(serde_json::to_string(&request).unwrap_or_default())
}

/// Invocation subscribing `target` to the stream of `run_id` under `tenant_id`.
pub fn subscribe_frame(tenant_id: &str, run_id: &str, target: &str) -> String {
    let request = SubscribeRequest {
        arguments: [tenant_id, run_id],
        target,
        message_type: MessageType::Invocation.into(),
    };
    terminate(serde_json::to_string(&request).unwrap_or_default())
}

/// Splits a received buffer into records, skipping empty records and the
/// `{}` handshake acknowledgement.
pub fn split_frames(buffer: &[u8]) -> impl Iterator<Item = &[u8]> {
    buffer
        .split(|byte| *byte == RECORD_SEPARATOR)
        .filter(|record| !record.is_empty() && *record != EMPTY_RECORD)
}
