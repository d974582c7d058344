// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal file parsing.
//!
//! A journal is newline-delimited JSON, one conversation entry per line,
//! appended by the agent while the core only reads. Because reads race the
//! writer, an incomplete last line (no trailing newline) is treated as
//! absent until the next change notification. A complete line that fails
//! to parse becomes a synthetic `x-error` entry so the UI can surface it
//! without breaking the read path.

use lo_core::ConversationEntry;
use std::io;
use std::path::Path;

/// Parse journal content into conversation entries.
pub fn parse_journal_str(content: &str) -> Vec<ConversationEntry> {
    let complete = match content.rfind('\n') {
        Some(last_newline) => &content[..=last_newline],
        None => "",
    };
    let mut entries = Vec::new();
    for (idx, line) in complete.split('\n').enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<ConversationEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::debug!(line_number = idx + 1, error = %e, "journal line failed to parse");
                entries.push(ConversationEntry::x_error(trimmed, idx + 1));
            }
        }
    }
    entries
}

/// Read and parse a journal file. A missing file reads as empty.
pub fn read_journal(path: &Path) -> io::Result<Vec<ConversationEntry>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_journal_str(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
