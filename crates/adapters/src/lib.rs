// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lo-adapters: process and filesystem adapters for Lookout.
//!
//! Everything that touches the outside world lives here: spawning and
//! driving the agent subprocess, and watching the agent's journal
//! directory for changes.

pub mod agent;
pub mod env;
pub mod watcher;

pub use agent::{
    AgentHandle, AgentLaunchError, AgentLauncher, AgentMessage, ClaudeLauncher, LaunchConfig,
    PermissionDecision, PermissionRequest,
};
pub use agent::feed::{message_feed, MessageFeed, MessageSource};
pub use watcher::{start_watcher, WatcherHandle};

#[cfg(any(test, feature = "test-support"))]
pub use agent::fake::{FakeAgentLauncher, RecordedLaunch};
