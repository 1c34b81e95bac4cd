//! Schedule expressions for target fetch intervals
//!
//! Supported forms:
//! - `@every <duration>` with compound durations (`10s`, `1m30s`, `500ms`, `2h`)
//! - a bare duration (`30s`)
//! - five-field cron (`*/5 * * * *`), evaluated in local time
//! - the descriptors `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//!   `@midnight` and `@hourly`, which are shorthands for cron expressions

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone};
use croner::Cron;
use regex::Regex;

use crate::error::{Result, SyncerError};

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<value>\d+(?:\.\d+)?)(?P<unit>ns|us|µs|ms|s|m|h)")
        .expect("duration pattern is valid")
});

/// Parse a compound duration such as `1h30m` or `250ms`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let invalid = || SyncerError::ConfigInvalid(format!("invalid duration '{}'", input));

    if input.is_empty() {
        return Err(invalid());
    }

    let mut total = 0f64;
    let mut consumed = 0usize;
    for caps in DURATION_PART.captures_iter(input) {
        let whole = caps.get(0).ok_or_else(invalid)?;
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let value: f64 = caps["value"].parse().map_err(|_| invalid())?;
        let nanos_per_unit = match &caps["unit"] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        total += value * nanos_per_unit;
    }

    if consumed != input.len() {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

/// When a target runs
#[derive(Clone)]
pub enum FetchSchedule {
    /// Fixed period, first run one period after registration
    Every(Duration),
    /// Wall-clock aligned cron schedule
    Cron { expression: String, cron: Arc<Cron> },
}

impl fmt::Debug for FetchSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSchedule::Every(period) => f.debug_tuple("Every").field(period).finish(),
            FetchSchedule::Cron { expression, .. } => {
                f.debug_tuple("Cron").field(expression).finish()
            }
        }
    }
}

impl PartialEq for FetchSchedule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FetchSchedule::Every(a), FetchSchedule::Every(b)) => a == b,
            (FetchSchedule::Cron { expression: a, .. }, FetchSchedule::Cron { expression: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

impl fmt::Display for FetchSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSchedule::Every(period) => write!(f, "@every {:?}", period),
            FetchSchedule::Cron { expression, .. } => f.write_str(expression),
        }
    }
}

impl FetchSchedule {
    /// First run strictly after `after`; `None` when the schedule never fires again
    pub fn next_run<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            FetchSchedule::Every(period) => {
                TimeDelta::from_std(*period).ok().map(|d| after.clone() + d)
            }
            FetchSchedule::Cron { cron, .. } => cron.find_next_occurrence(after, false).ok(),
        }
    }

    /// Time from `now` until the next run
    pub fn next_delay<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        let next = self.next_run(now)?;
        Some((next - now.clone()).to_std().unwrap_or_default())
    }
}

fn descriptor(expr: &str) -> Option<&'static str> {
    match expr {
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        "@monthly" => Some("0 0 1 * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@daily" | "@midnight" => Some("0 0 * * *"),
        "@hourly" => Some("0 * * * *"),
        _ => None,
    }
}

fn parse_cron(expr: &str, pattern: &str) -> Result<FetchSchedule> {
    let cron = Cron::new(pattern).parse().map_err(|e| {
        SyncerError::ConfigInvalid(format!("invalid cron fetch-interval '{}': {}", expr, e))
    })?;
    Ok(FetchSchedule::Cron {
        expression: expr.to_string(),
        cron: Arc::new(cron),
    })
}

/// Parse a fetch-interval expression
pub fn parse_schedule(expr: &str) -> Result<FetchSchedule> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("@every") {
        return every(expr, parse_duration(rest)?);
    }
    if let Some(pattern) = descriptor(expr) {
        return parse_cron(expr, pattern);
    }
    if expr.split_whitespace().count() == 5 {
        return parse_cron(expr, expr);
    }
    let period = parse_duration(expr).map_err(|_| {
        SyncerError::ConfigInvalid(format!("unsupported fetch-interval '{}'", expr))
    })?;
    every(expr, period)
}

fn every(expr: &str, period: Duration) -> Result<FetchSchedule> {
    if period.is_zero() {
        return Err(SyncerError::ConfigInvalid(format!(
            "fetch-interval '{}' must be greater than zero",
            expr
        )));
    }
    Ok(FetchSchedule::Every(period))
}
