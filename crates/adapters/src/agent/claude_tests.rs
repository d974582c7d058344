// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(line: &str) -> ProtocolLine {
    parse_protocol_line(&serde_json::from_str(line).unwrap())
}

#[test]
fn init_line_carries_session_id() {
    let parsed = parse(r#"{"type":"system","subtype":"init","session_id":"S1","tools":[]}"#);
    assert_eq!(
        parsed,
        ProtocolLine::Init {
            session_id: SessionId::new("S1")
        }
    );
}

#[yare::parameterized(
    assistant        = { r#"{"type":"assistant","message":{"content":[]}}"#, ProtocolLine::Assistant },
    user_echo        = { r#"{"type":"user","message":{"content":"hi"}}"#, ProtocolLine::User },
    result_ok        = { r#"{"type":"result","subtype":"success","is_error":false}"#, ProtocolLine::Result { is_error: false } },
    result_error     = { r#"{"type":"result","subtype":"error_during_execution","is_error":true}"#, ProtocolLine::Result { is_error: true } },
    result_no_flag   = { r#"{"type":"result","subtype":"success"}"#, ProtocolLine::Result { is_error: false } },
    system_non_init  = { r#"{"type":"system","subtype":"compact"}"#, ProtocolLine::Other },
    unknown_type     = { r#"{"type":"stream_event"}"#, ProtocolLine::Other },
    untyped          = { r#"{"foo":1}"#, ProtocolLine::Other },
)]
fn line_classification(line: &str, expected: ProtocolLine) {
    assert_eq!(parse(line), expected);
}

#[test]
fn can_use_tool_request_is_extracted() {
    let parsed = parse(
        r#"{"type":"control_request","request_id":"r1","request":{"subtype":"can_use_tool","tool_name":"Bash","input":{"command":"ls"},"permission_suggestions":[{"mode":"acceptEdits"}],"tool_use_id":"t1"}}"#,
    );
    match parsed {
        ProtocolLine::CanUseTool {
            request_id,
            request,
        } => {
            assert_eq!(request_id, "r1");
            assert_eq!(request.tool_name, "Bash");
            assert_eq!(request.input["command"], "ls");
            assert_eq!(request.suggestions.len(), 1);
            assert_eq!(request.tool_use_id.as_deref(), Some("t1"));
        }
        other => panic!("expected CanUseTool, got {other:?}"),
    }
}

#[test]
fn unknown_control_request_is_acked_not_surfaced() {
    let parsed = parse(r#"{"type":"control_request","request_id":"r2","request":{"subtype":"interrupt"}}"#);
    assert_eq!(
        parsed,
        ProtocolLine::UnknownControl {
            request_id: "r2".to_string()
        }
    );
}

#[test]
fn user_message_line_wraps_text_and_attachments() {
    let input = UserInput {
        text: "look".to_string(),
        images: vec![Attachment {
            media_type: "image/png".to_string(),
            data: "aGk=".to_string(),
        }],
        documents: Vec::new(),
    };
    let value: Value = serde_json::from_str(&user_message_line(&input)).unwrap();
    assert_eq!(value["type"], "user");
    let content = value["message"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[0]["text"], "look");
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[1]["source"]["media_type"], "image/png");
}

#[test]
fn control_response_line_encodes_allow_with_updated_input() {
    let decision = PermissionDecision::Allow {
        updated_input: Some(serde_json::json!({"command": "ls -la"})),
    };
    let value: Value = serde_json::from_str(&control_response_line("r1", &decision)).unwrap();
    assert_eq!(value["type"], "control_response");
    assert_eq!(value["response"]["request_id"], "r1");
    assert_eq!(value["response"]["response"]["behavior"], "allow");
    assert_eq!(value["response"]["response"]["updatedInput"]["command"], "ls -la");
}

#[test]
fn control_response_line_encodes_deny_reason() {
    let decision = PermissionDecision::Deny {
        message: "not now".to_string(),
    };
    let value: Value = serde_json::from_str(&control_response_line("r9", &decision)).unwrap();
    assert_eq!(value["response"]["response"]["behavior"], "deny");
    assert_eq!(value["response"]["response"]["message"], "not now");
}

#[yare::parameterized(
    plain         = { "1.0.97", Some((1, 0, 97)) },
    with_suffix   = { "1.0.97 (Claude Code)", Some((1, 0, 97)) },
    pre_release   = { "2.1.3-beta", Some((2, 1, 3)) },
    garbage       = { "not a version", None },
    empty         = { "", None },
)]
fn version_parsing(output: &str, expected: Option<(u64, u64, u64)>) {
    assert_eq!(parse_version(output), expected);
}

#[yare::parameterized(
    old      = { (1, 0, 81), false },
    boundary = { (1, 0, 82), true },
    newer    = { (1, 2, 0), true },
)]
fn control_protocol_gate(version: (u64, u64, u64), expected: bool) {
    assert_eq!(supports_control_protocol(version), expected);
}

#[yare::parameterized(
    npx_shim    = { "/home/u/.npm/_npx/abc123/node_modules/.bin/claude", true },
    real_global = { "/usr/local/bin/claude", false },
    npx_like_but_not_bin = { "/home/u/_npx/claude", false },
)]
fn npx_shim_detection(path: &str, expected: bool) {
    assert_eq!(is_npx_shim(Path::new(path)), expected);
}

#[yare::parameterized(
    usr_bin   = { "/usr/bin/claude", true },
    usr_local = { "/usr/local/bin/claude", true },
    homebrew  = { "/opt/homebrew/bin/claude", true },
    home      = { "/home/u/.local/bin/claude", false },
)]
fn system_path_preference(path: &str, expected: bool) {
    assert_eq!(is_system_path(Path::new(path)), expected);
}
