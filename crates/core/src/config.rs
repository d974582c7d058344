// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-level runtime configuration.
//!
//! Parsing a config file is out of scope for the core; the daemon resolves
//! these values from flags and environment and injects them at wiring time.

use crate::process::PermissionMode;
use serde::{Deserialize, Serialize};

/// User preferences that shape process spawning and supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Default permission mode for new session processes.
    #[serde(default)]
    pub permission_mode: PermissionMode,
    /// Paused processes idle longer than this many minutes are aborted.
    #[serde(default = "default_auto_abort_minutes")]
    pub auto_abort_minutes: u64,
}

fn default_auto_abort_minutes() -> u64 {
    60
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            permission_mode: PermissionMode::Default,
            auto_abort_minutes: default_auto_abort_minutes(),
        }
    }
}
