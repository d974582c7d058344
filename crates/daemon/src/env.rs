// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;

/// Listen port (`LOOKOUT_PORT`, default 3400).
pub fn port() -> u16 {
    std::env::var("LOOKOUT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3400)
}

/// Listen hostname (`LOOKOUT_HOSTNAME`, default 127.0.0.1).
pub fn hostname() -> String {
    std::env::var("LOOKOUT_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Optional API password (`LOOKOUT_PASSWORD`).
pub fn password() -> Option<String> {
    std::env::var("LOOKOUT_PASSWORD").ok().filter(|p| !p.is_empty())
}

/// State directory for the daemon's own files (scheduler config, caches,
/// logs): `$LOOKOUT_STATE_DIR`, else `~/.local/state/lookout`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LOOKOUT_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::state_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/state"))
        .join("lookout")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
