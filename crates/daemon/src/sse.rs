// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE gateway: projects bus events onto a per-connection frame stream.
//!
//! Each connection subscribes to a set of bus channels. Events frame as
//! `event: <name>\ndata: <json>\n\n`; heartbeats become `:` comment
//! frames that keep the connection alive. Back-pressure: when the
//! connection's buffer is full, droppable frames are discarded —
//! `sessionProcessChanged` is never dropped, it buffers without bound and
//! only a hard memory limit closes the connection.

use futures::Stream;
use lo_core::{BusEvent, Channel, EventBus, Subscription};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Droppable frames beyond this many queued are discarded.
const SOFT_BUFFER_LIMIT: usize = 256;

/// Critical frames beyond this many queued close the connection.
const HARD_BUFFER_LIMIT: usize = 65_536;

/// One server-sent-events frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `event:` + `data:` lines.
    Event { name: &'static str, data: String },
    /// A bare comment, used as keep-alive.
    Comment,
}

impl SseFrame {
    /// Project a bus event into its wire frame.
    pub fn from_bus_event(event: &BusEvent) -> Self {
        match event {
            BusEvent::Heartbeat {} => SseFrame::Comment,
            other => SseFrame::Event {
                name: other.channel().as_str(),
                data: serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
            },
        }
    }

    /// Encode as text/event-stream bytes.
    pub fn encode(&self) -> String {
        match self {
            SseFrame::Event { name, data } => format!("event: {name}\ndata: {data}\n\n"),
            SseFrame::Comment => ":\n\n".to_string(),
        }
    }
}

struct Shared {
    queued: AtomicUsize,
    closed: AtomicBool,
    soft_limit: usize,
    hard_limit: usize,
}

/// Per-connection frame stream; dropping it unsubscribes from the bus.
pub struct SseStream {
    rx: mpsc::UnboundedReceiver<SseFrame>,
    shared: Arc<Shared>,
    _subscription: Subscription,
}

/// Subscribe a connection to the requested channels (all when `None`).
pub fn subscribe(bus: &EventBus, channels: Option<HashSet<Channel>>) -> SseStream {
    subscribe_with_limits(bus, channels, SOFT_BUFFER_LIMIT, HARD_BUFFER_LIMIT)
}

fn subscribe_with_limits(
    bus: &EventBus,
    channels: Option<HashSet<Channel>>,
    soft_limit: usize,
    hard_limit: usize,
) -> SseStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        queued: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
        soft_limit,
        hard_limit,
    });

    let push = Arc::clone(&shared);
    let subscription = bus.subscribe(move |event| {
        if push.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(channels) = &channels {
            if !channels.contains(&event.channel()) {
                return;
            }
        }
        let critical = matches!(event, BusEvent::SessionProcessChanged { .. });
        let queued = push.queued.load(Ordering::Acquire);
        if critical {
            if queued >= push.hard_limit {
                tracing::error!("sse client too slow; closing connection under memory pressure");
                push.closed.store(true, Ordering::Release);
            }
        } else if queued >= push.soft_limit {
            tracing::debug!(channel = %event.channel(), "sse buffer full, frame dropped");
            return;
        }
        let frame = SseFrame::from_bus_event(event);
        if tx.send(frame).is_ok() {
            push.queued.fetch_add(1, Ordering::AcqRel);
        }
    });

    SseStream {
        rx,
        shared,
        _subscription: subscription,
    }
}

impl Stream for SseStream {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SseFrame>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                if self.shared.closed.load(Ordering::Acquire) {
                    // Deliver nothing more once the overflow close hit.
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(frame))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => {
                if self.shared.closed.load(Ordering::Acquire) {
                    Poll::Ready(None)
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
