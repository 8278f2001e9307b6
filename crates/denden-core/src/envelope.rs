//! Request envelope construction.
//!
//! Callers hand over a partially populated [`RawEnvelope`] decoded from user
//! input. [`build_envelope`] fills in whatever is missing from an
//! [`AmbientContext`] and checks that exactly one payload kind is present.
//! Fields the caller supplied are never overwritten.

use denden_protocol::{
    AskUserPayload, DelegatePayload, Payload, RequestEnvelope, Trace, PROTOCOL_VERSION,
};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

pub const REQUEST_ID_PREFIX: &str = "req_";

/// Decoded user input. Every field may be absent; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    #[serde(default, alias = "protocolVersion", alias = "denden_version")]
    pub denden_version: Option<String>,
    #[serde(default, alias = "request_id")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub trace: Option<RawTrace>,
    #[serde(default, alias = "ask_user")]
    pub ask_user: Option<AskUserPayload>,
    #[serde(default)]
    pub delegate: Option<DelegatePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrace {
    #[serde(default, alias = "created_at", with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, alias = "agent_instance_id")]
    pub agent_instance_id: Option<String>,
    #[serde(default, alias = "parent_agent_instance_id")]
    pub parent_agent_instance_id: Option<String>,
    #[serde(default, alias = "worktree_id")]
    pub worktree_id: Option<String>,
}

#[derive(Debug, Error)]
#[error("invalid JSON: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("exactly one of 'askUser' or 'delegate' payload is required")]
    MissingPayload,
}

impl ValidationError {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingPayload => "MISSING_PAYLOAD",
        }
    }
}

pub fn decode_raw(text: &str) -> Result<RawEnvelope, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

pub trait IdSource {
    /// Returns a fresh identifier, unique per call.
    fn next_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Per-run identifiers inherited from the orchestrator that spawned us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientIds {
    pub agent_id: Option<String>,
    pub parent_agent_id: Option<String>,
    pub worktree_id: Option<String>,
}

pub struct AmbientContext<'a> {
    pub ids: &'a AmbientIds,
    pub clock: &'a dyn Clock,
    pub id_source: &'a dyn IdSource,
}

pub fn build_envelope(
    raw: RawEnvelope,
    ctx: &AmbientContext<'_>,
) -> Result<RequestEnvelope, ValidationError> {
    let denden_version =
        present(raw.denden_version).unwrap_or_else(|| PROTOCOL_VERSION.to_owned());
    let request_id = present(raw.request_id)
        .unwrap_or_else(|| format!("{REQUEST_ID_PREFIX}{}", ctx.id_source.next_id()));

    let raw_trace = raw.trace.unwrap_or_default();
    let trace = Trace {
        created_at: raw_trace.created_at.unwrap_or_else(|| ctx.clock.now()),
        agent_instance_id: fill(raw_trace.agent_instance_id, ctx.ids.agent_id.as_deref()),
        parent_agent_instance_id: fill(
            raw_trace.parent_agent_instance_id,
            ctx.ids.parent_agent_id.as_deref(),
        ),
        worktree_id: fill(raw_trace.worktree_id, ctx.ids.worktree_id.as_deref()),
    };

    let payload = match (raw.ask_user, raw.delegate) {
        (Some(ask), None) => Payload::AskUser(ask),
        (None, Some(delegate)) => Payload::Delegate(delegate),
        _ => return Err(ValidationError::MissingPayload),
    };

    Ok(RequestEnvelope {
        denden_version,
        request_id,
        trace,
        payload,
    })
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn fill(supplied: Option<String>, ambient: Option<&str>) -> String {
    present(supplied)
        .or_else(|| ambient.map(str::to_owned))
        .unwrap_or_default()
}
