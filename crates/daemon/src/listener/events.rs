// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE endpoint: streams bus events to the browser.

use super::{ApiError, AppState};
use crate::sse::{self, SseFrame};
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use lo_adapters::AgentLauncher;
use lo_core::Channel;
use serde::Deserialize;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct EventsQuery {
    /// Comma-separated channel names; all channels when absent.
    channels: Option<String>,
}

pub async fn events<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let channels = match query.channels {
        None => None,
        Some(raw) => {
            let mut set = HashSet::new();
            for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let channel: Channel = name
                    .parse()
                    .map_err(|e: lo_core::event::UnknownChannel| ApiError::bad_request(e.to_string()))?;
                set.insert(channel);
            }
            Some(set)
        }
    };

    let stream = sse::subscribe(&state.bus, channels).map(|frame| {
        Ok(match frame {
            SseFrame::Event { name, data } => Event::default().event(name).data(data),
            SseFrame::Comment => Event::default().comment(""),
        })
    });
    Ok(Sse::new(stream))
}
