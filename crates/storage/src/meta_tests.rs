// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::journal::parse_journal_str;

fn entries(lines: &[&str]) -> Vec<ConversationEntry> {
    let mut content = lines.join("\n");
    content.push('\n');
    parse_journal_str(&content)
}

#[test]
fn first_user_message_skips_sidechains_and_tool_results() {
    let entries = entries(&[
        r#"{"type":"user","isSidechain":true,"message":{"content":"sidechain"}}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1"}]}}"#,
        r#"{"type":"user","message":{"content":"the real one"}}"#,
    ]);
    assert_eq!(first_user_message(&entries).as_deref(), Some("the real one"));
}

#[test]
fn first_user_message_none_when_no_user_turn() {
    let entries = entries(&[r#"{"type":"assistant","message":{"content":[]}}"#]);
    assert_eq!(first_user_message(&entries), None);
}

#[test]
fn context_usage_uses_last_qualifying_assistant() {
    let entries = entries(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":10}}}"#,
        r#"{"type":"assistant","message":{"usage":{"input_tokens":100,"cache_creation_input_tokens":40,"cache_read_input_tokens":60}}}"#,
        r#"{"type":"assistant","isSidechain":true,"message":{"usage":{"input_tokens":99999}}}"#,
        r#"{"type":"assistant","isApiErrorMessage":true,"message":{"usage":{"input_tokens":55555}}}"#,
    ]);
    let usage = current_context_usage(&entries).unwrap();
    assert_eq!(usage.tokens, 200);
    assert!((usage.percent - 0.1).abs() < 1e-9);
}

#[test]
fn context_usage_none_without_assistant() {
    let entries = entries(&[r#"{"type":"user","message":{"content":"hi"}}"#]);
    assert!(current_context_usage(&entries).is_none());
}

#[test]
fn cost_aggregates_usage_and_usd() {
    let main = entries(&[
        r#"{"type":"assistant","costUSD":0.25,"message":{"usage":{"input_tokens":100,"output_tokens":5}}}"#,
        r#"{"type":"user","message":{"content":"x"}}"#,
        r#"{"type":"assistant","message":{"usage":{"input_tokens":50,"cache_read_input_tokens":10}}}"#,
    ]);
    let side = entries(&[
        r#"{"type":"assistant","message":{"usage":{"input_tokens":7,"output_tokens":3}}}"#,
    ]);
    let cost = aggregate_cost(main.iter().chain(side.iter()));
    assert_eq!(cost.input_tokens, 157);
    assert_eq!(cost.output_tokens, 8);
    assert_eq!(cost.cache_read_input_tokens, 10);
    assert!((cost.total_usd - 0.25).abs() < 1e-9);
}

#[test]
fn model_name_takes_most_recent() {
    let entries = entries(&[
        r#"{"type":"assistant","message":{"model":"older-model"}}"#,
        r#"{"type":"assistant","message":{"model":"newer-model"}}"#,
    ]);
    assert_eq!(model_name(&entries).as_deref(), Some("newer-model"));
}

#[test]
fn message_count_excludes_parse_errors() {
    let entries = entries(&[
        r#"{"type":"user","message":{"content":"x"}}"#,
        "garbage line",
        r#"{"type":"assistant","message":{}}"#,
    ]);
    assert_eq!(message_count(&entries), 2);
}
