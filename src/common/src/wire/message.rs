use serde::{Deserialize, Serialize};

/// Message kinds of the JSON hub protocol. A frame without a type is `Undefined`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum MessageType {
    #[default]
    Undefined,
    Invocation,
    StreamItem,
    Completion,
    StreamInvocation,
    CancelInvocation,
    Ping,
    Close,
    Unknown(i64),
}

impl From<i64> for MessageType {
    fn from(value: i64) -> Self {
        match value {
            0 => MessageType::Undefined,
            1 => MessageType::Invocation,
            2 => MessageType::StreamItem,
            3 => MessageType::Completion,
            4 => MessageType::StreamInvocation,
            5 => MessageType::CancelInvocation,
            6 => MessageType::Ping,
            7 => MessageType::Close,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for i64 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Undefined => 0,
            MessageType::Invocation => 1,
            MessageType::StreamItem => 2,
            MessageType::Completion => 3,
            MessageType::StreamInvocation => 4,
            MessageType::CancelInvocation => 5,
            MessageType::Ping => 6,
            MessageType::Close => 7,
            MessageType::Unknown(other) => other,
        }
    }
}

/// An inbound hub frame. Only invocations carry `arguments`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage<T> {
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HandshakeRequest {
    pub protocol: &'static str,
    pub version: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubscribeRequest<'a> {
    pub arguments: [&'a str; 2],
    pub target: &'a str,
    #[serde(rename = "type")]
    pub message_type: i64,
}
