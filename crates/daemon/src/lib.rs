// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lo-daemon: the Lookout server process.
//!
//! Wires the engine together at startup, serves the HTTP/SSE surface,
//! and owns graceful shutdown.

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod sse;

pub use lifecycle::{startup, Config, Daemon, StartupError};
