// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message feed: the on-demand user-message sequence for one subprocess.
//!
//! The feed holds at most one unread message. `set_next_message` replaces
//! any unread item (there can be none while the agent is mid-turn, since
//! continuation is only legal on a paused process). The consumer side
//! blocks until a message is available and fires the resolved hook the
//! moment it takes one — that hook is what advances the session state
//! machine out of `pending`.

use lo_core::UserInput;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

type ResolvedHook = Box<dyn Fn(&UserInput) + Send + Sync>;

struct Shared {
    slot: Mutex<SlotState>,
    notify: Notify,
    resolved: Mutex<Option<ResolvedHook>>,
}

struct SlotState {
    next: Option<UserInput>,
    closed: bool,
}

/// Producer half: owned by the lifecycle coordinator.
#[derive(Clone)]
pub struct MessageFeed {
    shared: Arc<Shared>,
}

/// Consumer half: owned by the subprocess stdin pump.
pub struct MessageSource {
    shared: Arc<Shared>,
}

/// Create a connected feed/source pair.
pub fn message_feed() -> (MessageFeed, MessageSource) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(SlotState {
            next: None,
            closed: false,
        }),
        notify: Notify::new(),
        resolved: Mutex::new(None),
    });
    (
        MessageFeed {
            shared: Arc::clone(&shared),
        },
        MessageSource { shared },
    )
}

impl MessageFeed {
    /// Enqueue the next message, replacing any unread one.
    pub fn set_next_message(&self, input: UserInput) {
        self.shared.slot.lock().next = Some(input);
        self.shared.notify.notify_one();
    }

    /// Install the hook fired when the subprocess consumes a message.
    pub fn on_message_resolved(&self, hook: impl Fn(&UserInput) + Send + Sync + 'static) {
        *self.shared.resolved.lock() = Some(Box::new(hook));
    }

    /// Close the feed; the consumer sees end-of-sequence once the slot is
    /// drained.
    pub fn close(&self) {
        self.shared.slot.lock().closed = true;
        self.shared.notify.notify_one();
    }
}

impl MessageSource {
    /// Pull the next user message, blocking until one is enqueued.
    /// Returns `None` after `close()` with no message left.
    pub async fn next(&mut self) -> Option<UserInput> {
        loop {
            {
                let mut slot = self.shared.slot.lock();
                if let Some(input) = slot.next.take() {
                    drop(slot);
                    if let Some(hook) = self.shared.resolved.lock().as_ref() {
                        hook(&input);
                    }
                    return Some(input);
                }
                if slot.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
