//! Request and response envelopes.
//!
//! JSON names are camelCase; proto-style snake_case field names are accepted
//! as aliases on input. Unset optional fields are omitted on output so the
//! rendered form stays sparse.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::PROTOCOL_VERSION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(alias = "protocolVersion", alias = "denden_version")]
    pub denden_version: String,
    #[serde(alias = "request_id")]
    pub request_id: String,
    pub trace: Trace,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    #[serde(with = "time::serde::rfc3339", alias = "created_at")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        alias = "agent_instance_id",
        skip_serializing_if = "String::is_empty"
    )]
    pub agent_instance_id: String,
    #[serde(
        default,
        alias = "parent_agent_instance_id",
        skip_serializing_if = "String::is_empty"
    )]
    pub parent_agent_instance_id: String,
    #[serde(default, alias = "worktree_id", skip_serializing_if = "String::is_empty")]
    pub worktree_id: String,
}

/// The business payload of a request. Exactly one kind is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    AskUser(AskUserPayload),
    Delegate(DelegatePayload),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AskUser(_) => "askUser",
            Self::Delegate(_) => "delegate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskUserPayload {
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatePayload {
    #[serde(default, alias = "delegate_to")]
    pub delegate_to: String,
    #[serde(default)]
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub text: String,
    #[serde(
        default,
        alias = "return_format",
        skip_serializing_if = "Format::is_unspecified"
    )]
    pub return_format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    Text,
    Json,
    /// Catch-all for names this client does not know; must stay last.
    #[default]
    #[serde(rename = "FORMAT_UNSPECIFIED", other)]
    Unspecified,
}

impl Format {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    Error,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(
        default,
        alias = "protocolVersion",
        alias = "denden_version",
        skip_serializing_if = "String::is_empty"
    )]
    pub denden_version: String,
    #[serde(default, alias = "request_id", skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    pub status: ResponseStatus,
    #[serde(
        default,
        alias = "ask_user_result",
        skip_serializing_if = "Option::is_none"
    )]
    pub ask_user_result: Option<AskUserResult>,
    #[serde(
        default,
        alias = "delegate_result",
        skip_serializing_if = "Option::is_none"
    )]
    pub delegate_result: Option<DelegateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

/// Borrowed view of whichever result a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseResult<'a> {
    AskUser(&'a AskUserResult),
    Delegate(&'a DelegateResult),
}

impl ResponseEnvelope {
    pub fn ok_ask_user(request_id: &str, result: AskUserResult) -> Self {
        Self {
            ask_user_result: Some(result),
            ..Self::bare(request_id, ResponseStatus::Ok)
        }
    }

    pub fn ok_delegate(request_id: &str, result: DelegateResult) -> Self {
        Self {
            delegate_result: Some(result),
            ..Self::bare(request_id, ResponseStatus::Ok)
        }
    }

    pub fn denied(request_id: &str, code: &str, message: &str) -> Self {
        Self {
            error: Some(ErrorDetail {
                code: code.to_owned(),
                message: message.to_owned(),
                retryable: false,
            }),
            ..Self::bare(request_id, ResponseStatus::Denied)
        }
    }

    pub fn error(request_id: &str, code: &str, message: &str, retryable: bool) -> Self {
        Self {
            error: Some(ErrorDetail {
                code: code.to_owned(),
                message: message.to_owned(),
                retryable,
            }),
            ..Self::bare(request_id, ResponseStatus::Error)
        }
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    fn bare(request_id: &str, status: ResponseStatus) -> Self {
        Self {
            denden_version: PROTOCOL_VERSION.to_owned(),
            request_id: request_id.to_owned(),
            status,
            ask_user_result: None,
            delegate_result: None,
            error: None,
            meta: None,
        }
    }

    pub fn result(&self) -> Option<ResponseResult<'_>> {
        if let Some(r) = &self.ask_user_result {
            return Some(ResponseResult::AskUser(r));
        }
        self.delegate_result.as_ref().map(ResponseResult::Delegate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AskUserResult {
    Text(String),
    Choice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(
        default,
        alias = "output_format",
        skip_serializing_if = "Format::is_unspecified"
    )]
    pub output_format: Format,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(
        default,
        alias = "orchestrator_action_id",
        skip_serializing_if = "String::is_empty"
    )]
    pub orchestrator_action_id: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}
