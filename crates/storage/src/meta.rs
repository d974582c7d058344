// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived session metadata.

use lo_core::entry::context_tokens;
use lo_core::ConversationEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Size of the model context window used for the usage percentage.
const CONTEXT_WINDOW_TOKENS: u64 = 200_000;

/// Aggregated token usage and USD cost for a session, including any
/// agent side-channel files belonging to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub total_usd: f64,
}

/// Context consumption of the most recent assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    pub tokens: u64,
    pub percent: f64,
}

/// Metadata derived from a session's conversation entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_user_message: Option<String>,
    pub cost: SessionCost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context_usage: Option<ContextUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub last_modified_at: String,
}

/// First real user turn of the conversation (tool_result bodies and
/// sidechain turns do not count).
pub fn first_user_message(entries: &[ConversationEntry]) -> Option<String> {
    entries
        .iter()
        .filter(|e| e.is_user() && !e.is_sidechain)
        .find_map(|e| e.user_text())
}

/// Context usage of the last assistant message that is neither a
/// sidechain turn nor flagged as an API error.
pub fn current_context_usage(entries: &[ConversationEntry]) -> Option<ContextUsage> {
    let usage = entries
        .iter()
        .rev()
        .find(|e| e.is_assistant() && !e.is_sidechain && !e.is_api_error())?
        .usage()?;
    let tokens = context_tokens(usage);
    Some(ContextUsage {
        tokens,
        percent: tokens as f64 / CONTEXT_WINDOW_TOKENS as f64 * 100.0,
    })
}

/// Model name of the most recent assistant message that carries one.
pub fn model_name(entries: &[ConversationEntry]) -> Option<String> {
    entries
        .iter()
        .rev()
        .find_map(|e| e.model().map(String::from))
}

/// Sum token usage and USD cost over all assistant messages of the main
/// journal plus any agent side-channel entries belonging to the session.
pub fn aggregate_cost<'a>(
    entries: impl Iterator<Item = &'a ConversationEntry>,
) -> SessionCost {
    let mut cost = SessionCost::default();
    for entry in entries {
        if let Some(usd) = entry.cost_usd() {
            cost.total_usd += usd;
        }
        if !entry.is_assistant() {
            continue;
        }
        let Some(usage) = entry.usage() else { continue };
        let get = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        cost.input_tokens += get("input_tokens");
        cost.output_tokens += get("output_tokens");
        cost.cache_creation_input_tokens += get("cache_creation_input_tokens");
        cost.cache_read_input_tokens += get("cache_read_input_tokens");
    }
    cost
}

/// Number of conversation entries, not counting synthetic parse errors.
pub fn message_count(entries: &[ConversationEntry]) -> usize {
    entries.iter().filter(|e| !e.is_x_error()).count()
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
