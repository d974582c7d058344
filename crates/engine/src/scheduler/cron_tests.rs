// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[yare::parameterized(
    every_minute     = { "*/1 * * * *" },
    every_five       = { "*/5 * * * *" },
    daily_at_nine    = { "0 9 * * *" },
    six_field        = { "30 */2 * * * *" },
)]
fn accepts_common_expressions(expr: &str) {
    assert!(parse_cron(expr).is_ok());
}

#[yare::parameterized(
    empty       = { "" },
    words       = { "every five minutes" },
    bad_field   = { "*/1 * * * bogus" },
)]
fn rejects_malformed_expressions(expr: &str) {
    assert!(matches!(
        parse_cron(expr),
        Err(SchedulerError::InvalidCron { .. })
    ));
}

#[test]
fn first_fire_is_strictly_after_reference_time() {
    let schedule = parse_cron("*/1 * * * *").unwrap();
    // Exactly on a minute boundary: the next fire is the next minute,
    // never the boundary itself.
    let on_boundary = Utc.with_ymd_and_hms(2026, 1, 30, 8, 0, 0).unwrap();
    let next = next_fire(&schedule, on_boundary).unwrap();
    assert!(next > on_boundary);
    assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 30, 8, 1, 0).unwrap());
}

#[test]
fn next_fire_honors_step_expressions() {
    let schedule = parse_cron("*/15 * * * *").unwrap();
    let after = Utc.with_ymd_and_hms(2026, 1, 30, 8, 7, 12).unwrap();
    assert_eq!(
        next_fire(&schedule, after).unwrap(),
        Utc.with_ymd_and_hms(2026, 1, 30, 8, 15, 0).unwrap()
    );
}

#[test]
fn consecutive_fires_advance_monotonically() {
    let schedule = parse_cron("*/1 * * * *").unwrap();
    let mut at = Utc.with_ymd_and_hms(2026, 1, 30, 8, 0, 30).unwrap();
    let mut seen = Vec::new();
    for _ in 0..3 {
        at = next_fire(&schedule, at).unwrap();
        seen.push(at);
    }
    assert_eq!(seen[0].format("%H:%M:%S").to_string(), "08:01:00");
    assert_eq!(seen[1].format("%H:%M:%S").to_string(), "08:02:00");
    assert_eq!(seen[2].format("%H:%M:%S").to_string(), "08:03:00");
}
