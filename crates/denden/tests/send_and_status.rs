mod support;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use denden_protocol::{
    AskUserResult, DelegateResult, HealthSnapshot, Payload, RequestEnvelope, ResponseEnvelope,
    ResponseFrame, ResponseMeta, TransportCode, DENY_ROLE_NOT_ALLOWED, MSG_SEND, MSG_STATUS,
    PROTOCOL_VERSION,
};
use predicates::prelude::*;
use serde_json::Value;

use support::{closed_addr, FakeOrchestrator};

fn denden(addr: impl ToString) -> Command {
    let mut cmd = cargo_bin_cmd!("denden");
    for key in [
        "DENDEN_AGENT_ID",
        "DENDEN_PARENT_AGENT_ID",
        "DENDEN_WORKTREE_ID",
        "DENDEN_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("DENDEN_ADDR", addr.to_string());
    cmd.env("DENDEN_TIMEOUT", "5s");
    cmd
}

fn envelope_of(frame: &denden_protocol::RequestFrame) -> RequestEnvelope {
    serde_json::from_value(frame.payload.clone()).unwrap()
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn ask_user_fills_envelope_and_prints_result() {
    let server = FakeOrchestrator::start(|req| {
        let env = envelope_of(req);
        let Payload::AskUser(ask) = env.payload else {
            panic!("expected askUser");
        };
        let resp =
            ResponseEnvelope::ok_ask_user(&env.request_id, AskUserResult::Text(ask.question));
        Some(ResponseFrame::ok(req, serde_json::to_value(resp).unwrap()))
    });

    let output = denden(server.addr)
        .env("DENDEN_AGENT_ID", "agent-7")
        .env("DENDEN_WORKTREE_ID", "wt-3")
        .args(["send", r#"{"askUser":{"question":"what color?"}}"#])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let frame = server.request();
    assert_eq!(frame.r#type, MSG_SEND);
    let sent = envelope_of(&frame);
    assert_eq!(frame.id, sent.request_id);
    assert_eq!(sent.denden_version, PROTOCOL_VERSION);
    assert!(sent.request_id.starts_with("req_"), "{}", sent.request_id);
    assert_eq!(sent.trace.agent_instance_id, "agent-7");
    assert_eq!(sent.trace.worktree_id, "wt-3");
    assert!(sent.trace.parent_agent_instance_id.is_empty());

    let printed = stdout_json(&output);
    assert_eq!(printed["status"], "OK");
    assert_eq!(printed["requestId"], sent.request_id.as_str());
    assert_eq!(printed["askUserResult"], serde_json::json!({"text": "what color?"}));
    assert!(printed.get("error").is_none());
}

#[test]
fn delegate_keeps_supplied_request_id() {
    let server = FakeOrchestrator::start(|req| {
        let env = envelope_of(req);
        let Payload::Delegate(delegate) = env.payload else {
            panic!("expected delegate");
        };
        let resp = ResponseEnvelope::ok_delegate(
            &env.request_id,
            DelegateResult {
                summary: delegate.task.text,
                output_format: delegate.task.return_format,
            },
        )
        .with_meta(ResponseMeta {
            orchestrator_action_id: "act_1".to_owned(),
        });
        Some(ResponseFrame::ok(req, serde_json::to_value(resp).unwrap()))
    });

    let output = denden(server.addr)
        .args([
            "send",
            r#"{"requestId":"req_mine","delegate":{"delegateTo":"implementer","task":{"text":"build it","returnFormat":"JSON"}}}"#,
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let sent = envelope_of(&server.request());
    assert_eq!(sent.request_id, "req_mine");

    let printed = stdout_json(&output);
    assert_eq!(printed["requestId"], "req_mine");
    assert_eq!(
        printed["delegateResult"],
        serde_json::json!({"summary": "build it", "outputFormat": "JSON"})
    );
    assert_eq!(printed["meta"]["orchestratorActionId"], "act_1");
}

#[test]
fn denied_response_is_printed_and_exits_nonzero() {
    let server = FakeOrchestrator::start(|req| {
        let env = envelope_of(req);
        let resp = ResponseEnvelope::denied(
            &env.request_id,
            DENY_ROLE_NOT_ALLOWED,
            "agents cannot delegate",
        );
        Some(ResponseFrame::ok(req, serde_json::to_value(resp).unwrap()))
    });

    let output = denden(server.addr)
        .args([
            "send",
            r#"{"delegate":{"delegateTo":"planner","task":{"text":"plan"}}}"#,
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    server.request();

    let printed = stdout_json(&output);
    assert_eq!(printed["status"], "DENIED");
    assert_eq!(printed["error"]["code"], DENY_ROLE_NOT_ALLOWED);
    assert_eq!(printed["error"]["message"], "agents cannot delegate");
}

#[test]
fn invalid_json_fails_before_connecting() {
    denden(closed_addr())
        .args(["send", "{not json"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("invalid JSON: "));
}

#[test]
fn missing_payload_fails_before_connecting() {
    for input in ["{}", r#"{"requestId":"req_1"}"#] {
        denden(closed_addr())
            .args(["send", input])
            .assert()
            .code(1)
            .stdout("")
            .stderr(predicate::str::contains("payload is required"))
            .stderr(predicate::str::contains("Unavailable").not());
    }
}

#[test]
fn unreachable_server_reports_unavailable() {
    denden(closed_addr())
        .args(["send", r#"{"askUser":{"question":"q"}}"#])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("error: Unavailable: "));
}

#[test]
fn silent_server_hits_the_deadline() {
    let server = FakeOrchestrator::start(|_| None);

    denden(server.addr)
        .env("DENDEN_TIMEOUT", "200ms")
        .args(["send", r#"{"askUser":{"question":"q"}}"#])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("error: DeadlineExceeded: "));
    server.request();
}

#[test]
fn server_fault_is_reported_with_its_code() {
    let server = FakeOrchestrator::start(|req| {
        Some(ResponseFrame::fault(
            req,
            TransportCode::Unimplemented,
            "unknown method",
        ))
    });

    denden(server.addr)
        .args(["send", r#"{"askUser":{"question":"q"}}"#])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "error: Unimplemented: unknown method",
        ));
    server.request();
}

#[test]
fn addr_flag_overrides_environment() {
    let server = FakeOrchestrator::start(|req| {
        let health = HealthSnapshot {
            uptime_seconds: 1,
            active_agents: 2,
        };
        Some(ResponseFrame::ok(req, serde_json::to_value(health).unwrap()))
    });

    denden(closed_addr())
        .args(["status", "--addr", &server.addr.to_string()])
        .assert()
        .success();
    server.request();
}

#[test]
fn status_prints_health() {
    let server = FakeOrchestrator::start(|req| {
        let health = HealthSnapshot {
            uptime_seconds: 42,
            active_agents: 0,
        };
        Some(ResponseFrame::ok(req, serde_json::to_value(health).unwrap()))
    });

    let output = denden(server.addr).arg("status").output().unwrap();
    assert!(output.status.success(), "{output:?}");
    assert_eq!(server.request().r#type, MSG_STATUS);

    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"uptimeSeconds": 42, "activeAgents": 0})
    );
}

#[test]
fn status_against_unreachable_server_fails() {
    denden(closed_addr())
        .arg("status")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("error: Unavailable: "));
}

#[test]
fn unparsable_timeout_falls_back_to_default() {
    let server = FakeOrchestrator::start(|req| {
        Some(ResponseFrame::ok(
            req,
            serde_json::to_value(HealthSnapshot::default()).unwrap(),
        ))
    });

    denden(server.addr)
        .env("DENDEN_TIMEOUT", "soon")
        .arg("status")
        .assert()
        .success();
    server.request();
}
