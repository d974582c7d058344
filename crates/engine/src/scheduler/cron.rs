// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression parsing and next-occurrence computation.

use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse a cron expression. Standard 5-field expressions are accepted by
/// normalizing to the 6-field form (seconds pinned to 0).
pub(crate) fn parse_cron(expr: &str) -> Result<CronSchedule, SchedulerError> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    CronSchedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// The next fire time strictly after `after`. A schedule never fires at
/// the instant it was evaluated.
pub(crate) fn next_fire(schedule: &CronSchedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
