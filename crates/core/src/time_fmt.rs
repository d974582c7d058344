// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 UTC timestamp formatting and parsing.
//!
//! Journal entries and scheduler jobs carry timestamps as strings in the
//! agent's own format (`2026-01-30T08:17:05.123Z`); these helpers keep the
//! rendering consistent with what the agent writes.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Format epoch milliseconds as an ISO-8601 UTC timestamp with millisecond
/// precision and a `Z` suffix.
pub fn format_iso_utc(epoch_ms: u64) -> String {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp (with or without fractional seconds, any
/// offset) into a UTC datetime.
pub fn parse_iso_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
