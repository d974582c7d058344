// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn formats_epoch_zero() {
    assert_eq!(format_iso_utc(0), "1970-01-01T00:00:00.000Z");
}

#[test]
fn formats_with_millis() {
    assert_eq!(format_iso_utc(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
}

#[yare::parameterized(
    plain      = { "2026-01-30T08:17:05Z" },
    millis     = { "2026-01-30T08:17:05.123Z" },
    offset     = { "2026-01-30T09:17:05+01:00" },
)]
fn parses_iso_variants(s: &str) {
    assert!(parse_iso_utc(s).is_some());
}

#[test]
fn parse_rejects_garbage() {
    assert!(parse_iso_utc("not a timestamp").is_none());
}

#[test]
fn format_parse_roundtrip() {
    let ms = 1_764_512_345_678;
    let parsed = parse_iso_utc(&format_iso_utc(ms)).unwrap();
    assert_eq!(parsed.timestamp_millis(), ms as i64);
}
