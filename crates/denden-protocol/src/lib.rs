//! Wire types for the DenDen orchestration protocol.
//!
//! Communication with the orchestrator uses JSONL (newline-delimited JSON)
//! over TCP. The client writes one [`RequestFrame`] and reads one
//! [`ResponseFrame`] per connection. Frame payloads carry the envelopes
//! defined in [`envelope`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod envelope;

pub use envelope::{
    AskUserPayload, AskUserResult, DelegatePayload, DelegateResult, ErrorDetail, Format, Payload,
    RequestEnvelope, ResponseEnvelope, ResponseMeta, ResponseResult, ResponseStatus, Task, Trace,
};

/// Protocol version stamped on envelopes that do not carry one.
pub const PROTOCOL_VERSION: &str = "1.0";

pub const MSG_SEND: &str = "denden.send";
pub const MSG_STATUS: &str = "denden.status";

pub const DENY_ROLE_NOT_ALLOWED: &str = "DENY_ROLE_NOT_ALLOWED";
pub const DENY_DEPTH_LIMIT: &str = "DENY_DEPTH_LIMIT";
pub const DENY_BUDGET_EXCEEDED: &str = "DENY_BUDGET_EXCEEDED";
pub const DENY_TOOLS_NOT_ALLOWED: &str = "DENY_TOOLS_NOT_ALLOWED";
pub const DENY_POLICY_REQUIRES_HUMAN: &str = "DENY_POLICY_REQUIRES_HUMAN";
pub const ERR_SUBAGENT_TIMEOUT: &str = "ERR_SUBAGENT_TIMEOUT";
pub const ERR_SUBAGENT_FAILURE: &str = "ERR_SUBAGENT_FAILURE";
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub payload: Value,
}

impl RequestFrame {
    pub fn send(envelope: &RequestEnvelope) -> serde_json::Result<Self> {
        Ok(Self {
            r#type: MSG_SEND.to_owned(),
            id: envelope.request_id.clone(),
            payload: serde_json::to_value(envelope)?,
        })
    }

    pub fn status(id: String) -> Self {
        Self {
            r#type: MSG_STATUS.to_owned(),
            id,
            payload: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
    #[serde(default)]
    pub payload: Value,
}

impl ResponseFrame {
    /// Successful reply to `request` carrying `payload`.
    pub fn ok(request: &RequestFrame, payload: Value) -> Self {
        Self {
            r#type: request.r#type.clone(),
            id: request.id.clone(),
            success: true,
            error: None,
            payload,
        }
    }

    /// Transport-level fault reply to `request`.
    pub fn fault(request: &RequestFrame, code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            r#type: request.r#type.clone(),
            id: request.id.clone(),
            success: false,
            error: Some(FrameError {
                code,
                message: message.into(),
            }),
            payload: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameError {
    pub code: TransportCode,
    #[serde(default)]
    pub message: String,
}

/// Transport-level status codes.
///
/// These describe failures of the exchange itself, never the orchestrator's
/// verdict on a request (that lives in [`ResponseStatus`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportCode {
    InvalidArgument,
    DeadlineExceeded,
    Unimplemented,
    Internal,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl TransportCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator health as reported by `denden.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    #[serde(default, alias = "uptime_seconds")]
    pub uptime_seconds: u64,
    #[serde(default, alias = "active_agents")]
    pub active_agents: u64,
}
