// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::path::PathBuf;
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Journal change debounce window (default: 300ms, trailing edge).
pub fn debounce_ms() -> Duration {
    parse_duration_ms("LOOKOUT_DEBOUNCE_MS").unwrap_or(Duration::from_millis(300))
}

/// The agent's state directory (`CLAUDE_CONFIG_DIR`, default `~/.claude`).
pub fn claude_dir() -> PathBuf {
    std::env::var("CLAUDE_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".claude"))
}

/// The agent's journal directory (`<claude_dir>/projects`).
pub fn projects_dir() -> PathBuf {
    claude_dir().join("projects")
}

/// Explicit agent binary override (`LOOKOUT_EXECUTABLE`).
pub fn executable_override() -> Option<PathBuf> {
    std::env::var("LOOKOUT_EXECUTABLE").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
