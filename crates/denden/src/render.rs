//! Structured output for scripts: pretty JSON with two-space indentation.
//! Unset fields are already omitted by the protocol types' serde attributes.

use denden_core::outcome::TransportFailure;
use denden_protocol::{HealthSnapshot, ResponseEnvelope};

pub fn render_response(resp: &ResponseEnvelope) -> serde_json::Result<String> {
    serde_json::to_string_pretty(resp)
}

pub fn render_health(health: &HealthSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(health)
}

pub fn render_failure(err: &TransportFailure) -> String {
    format!("error: {err}")
}
