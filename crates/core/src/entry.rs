// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation entry model for journal lines.
//!
//! One entry per journal line. Only the tag, uuid, parent uuid, session id,
//! timestamp, and sidechain flag are interpreted; everything else (message
//! content, usage, tool blocks) is carried verbatim in `rest` so unknown
//! entry types and future fields survive a read/serve round trip.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Entry tag for a parse failure synthesized by the journal reader.
pub const X_ERROR: &str = "x-error";

/// A single conversation entry as stored in a journal file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "parentUuid", default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "isSidechain", default)]
    pub is_sidechain: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ConversationEntry {
    /// Build a user entry holding plain text, as the agent would write it.
    pub fn user(session_id: &str, uuid: String, parent_uuid: Option<String>, timestamp: String, text: &str) -> Self {
        let mut rest = Map::new();
        rest.insert(
            "message".to_string(),
            json!({ "role": "user", "content": text }),
        );
        Self {
            kind: "user".to_string(),
            uuid: Some(uuid),
            parent_uuid,
            session_id: Some(session_id.to_string()),
            timestamp: Some(timestamp),
            is_sidechain: false,
            rest,
        }
    }

    /// Build a synthetic entry for a journal line that failed to parse.
    pub fn x_error(line: &str, line_number: usize) -> Self {
        let mut rest = Map::new();
        rest.insert("line".to_string(), Value::String(line.to_string()));
        rest.insert("lineNumber".to_string(), json!(line_number));
        Self {
            kind: X_ERROR.to_string(),
            uuid: None,
            parent_uuid: None,
            session_id: None,
            timestamp: None,
            is_sidechain: false,
            rest,
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == "user"
    }

    pub fn is_assistant(&self) -> bool {
        self.kind == "assistant"
    }

    pub fn is_summary(&self) -> bool {
        self.kind == "summary"
    }

    pub fn is_x_error(&self) -> bool {
        self.kind == X_ERROR
    }

    /// The opaque message payload, when present.
    pub fn message(&self) -> Option<&Value> {
        self.rest.get("message")
    }

    /// Token usage block of an assistant message.
    pub fn usage(&self) -> Option<&Value> {
        self.message()?.get("usage")
    }

    /// Whether the entry is flagged as an API error message.
    pub fn is_api_error(&self) -> bool {
        self.rest
            .get("isApiErrorMessage")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Model name recorded on an assistant message.
    pub fn model(&self) -> Option<&str> {
        self.message()?.get("model")?.as_str()
    }

    /// USD cost recorded on the entry, when the agent wrote one.
    pub fn cost_usd(&self) -> Option<f64> {
        self.rest.get("costUSD").and_then(Value::as_f64)
    }

    /// The leaf uuid referenced by a summary entry.
    pub fn summary_leaf_uuid(&self) -> Option<&str> {
        if !self.is_summary() {
            return None;
        }
        self.rest.get("leafUuid")?.as_str()
    }

    /// Plain text of a user message, skipping tool_result bodies.
    ///
    /// Returns `None` when the message carries no real user text (e.g. the
    /// content is only tool results).
    pub fn user_text(&self) -> Option<String> {
        if !self.is_user() {
            return None;
        }
        let content = self.message()?.get("content")?;
        match content {
            Value::String(s) => Some(s.clone()),
            Value::Array(blocks) => {
                let text: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text.join("\n"))
                }
            }
            _ => None,
        }
    }
}

/// Sum of `input_tokens + cache_creation_input_tokens + cache_read_input_tokens`
/// from a usage block.
pub fn context_tokens(usage: &Value) -> u64 {
    ["input_tokens", "cache_creation_input_tokens", "cache_read_input_tokens"]
        .iter()
        .filter_map(|key| usage.get(*key).and_then(Value::as_u64))
        .sum()
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
