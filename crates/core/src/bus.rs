// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed in-process event bus.
//!
//! Listeners run synchronously on the emitter's call path, in registration
//! order; every listener must be a bounded non-blocking operation (forward
//! to an async worker, push into a channel). Emission is fire-and-forget:
//! a panicking listener is caught and logged, never propagated. The bus
//! never drops events; a slow listener blocks the emitter.

use crate::event::BusEvent;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Publish/subscribe broker shared by all components.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all channels. The returned subscription
    /// detaches the listener when cancelled or dropped.
    pub fn subscribe(&self, listener: impl Fn(&BusEvent) + Send + Sync + 'static) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every listener, in registration order.
    pub fn emit(&self, event: &BusEvent) {
        // Snapshot outside the lock so listeners may subscribe/cancel freely.
        let listeners: Vec<Listener> = {
            let inner = self.inner.lock();
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(channel = %event.channel(), "bus listener panicked");
            }
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

/// Handle to a registered listener; cancelling (or dropping) detaches it.
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<BusInner>>,
}

impl Subscription {
    /// Detach the listener. After this returns no further invocations occur.
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
