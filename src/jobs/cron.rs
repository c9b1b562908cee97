//! Schedule arithmetic over standard cron expressions.
//!
//! Accepts `min hour dom mon dow` and `sec min hour dom mon dow`. Numeric
//! day-of-week values follow the usual convention (0 and 7 are Sunday) and are
//! rewritten to day names before parsing, so the result reads the same for the
//! `cron` crate and for `tokio-cron-scheduler`. When both day-of-month and
//! day-of-week are restricted, a day matching either field qualifies.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;

use crate::jobs::error::JobError;

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Default interval used when a schedule cannot be evaluated
pub const DEFAULT_FALLBACK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct CronCalculator {
    fallback: TimeDelta,
}

impl Default for CronCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK)
    }
}

impl CronCalculator {
    pub fn new(fallback: Duration) -> Self {
        Self {
            fallback: TimeDelta::from_std(fallback).unwrap_or(TimeDelta::days(1)),
        }
    }

    /// First instant strictly after `from` (now when `None`)
    ///
    /// Never fails: an unusable expression is logged and the fallback interval
    /// is added to `from` instead.
    pub fn next_run_time(&self, schedule: &str, from: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let from = from.unwrap_or_else(Utc::now);

        let next = Self::parse(schedule).and_then(|parsed| {
            parsed
                .iter()
                .filter_map(|s| s.after(&from).next())
                .min()
                .ok_or_else(|| JobError::invalid_cron(schedule, "no future occurrence"))
        });

        match next {
            Ok(next) => next,
            Err(e) => {
                let fallback = from + self.fallback;
                tracing::warn!(
                    schedule = %schedule,
                    error = %e,
                    fallback = %fallback,
                    "Unusable schedule, falling back to fixed interval"
                );
                fallback
            }
        }
    }

    /// The next `count` instants after `from`
    pub fn upcoming(
        schedule: &str,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, JobError> {
        let mut runs: Vec<DateTime<Utc>> = Self::parse(schedule)?
            .iter()
            .flat_map(|s| s.after(&from).take(count))
            .collect();
        runs.sort_unstable();
        runs.dedup();
        runs.truncate(count);
        Ok(runs)
    }

    pub fn validate(schedule: &str) -> Result<(), JobError> {
        Self::parse(schedule).map(|_| ())
    }

    /// Six-field form with named weekdays
    pub fn normalize(schedule: &str) -> Result<String, JobError> {
        let fields: Vec<&str> = schedule.split_whitespace().collect();
        let (seconds, rest) = match fields.len() {
            5 => ("0", &fields[..]),
            6 => (fields[0], &fields[1..]),
            n => {
                return Err(JobError::invalid_cron(
                    schedule,
                    format!("expected 5 or 6 fields, found {n}"),
                ));
            }
        };

        let day_of_week = normalize_day_of_week(rest[4])
            .ok_or_else(|| JobError::invalid_cron(schedule, "invalid day-of-week field"))?;

        Ok(format!(
            "{seconds} {} {} {} {} {day_of_week}",
            rest[0], rest[1], rest[2], rest[3]
        ))
    }

    /// One schedule, or two whose occurrences are merged when both day fields
    /// are restricted (the `cron` crate would require both to match)
    fn parse(schedule: &str) -> Result<Vec<Schedule>, JobError> {
        let normalized = Self::normalize(schedule)?;
        let compile =
            |expr: &str| Schedule::from_str(expr).map_err(|e| JobError::invalid_cron(schedule, e));

        let fields: Vec<&str> = normalized.split_whitespace().collect();
        let &[sec, min, hour, dom, mon, dow] = fields.as_slice() else {
            return Err(JobError::invalid_cron(schedule, "expected 6 fields after normalizing"));
        };

        if is_unrestricted(dom) || is_unrestricted(dow) {
            return Ok(vec![compile(&normalized)?]);
        }

        Ok(vec![
            compile(&format!("{sec} {min} {hour} {dom} {mon} *"))?,
            compile(&format!("{sec} {min} {hour} * {mon} {dow}"))?,
        ])
    }
}

/// `*` in any form, or `?`
fn is_unrestricted(field: &str) -> bool {
    field.starts_with('*') || field == "?"
}

fn normalize_day_of_week(field: &str) -> Option<String> {
    let parts = field
        .split(',')
        .map(normalize_day_of_week_part)
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(","))
}

fn normalize_day_of_week_part(part: &str) -> Option<String> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (part, None),
    };
    let with_step = |base: String| match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    };

    if base == "*" || base == "?" {
        return Some(with_step(base.to_string()));
    }

    match base.split_once('-') {
        Some((start, end)) => match (day_number(start), day_number(end)) {
            (Some(s), Some(e)) if s > e => None,
            // Sunday as 7 cannot close a named range, and steps count from the
            // numeric start, so these are spelled out day by day
            (Some(s), Some(e)) if e == 7 || step.is_some() => day_list(s, e, step),
            (Some(s), Some(e)) => Some(format!("{}-{}", DAY_NAMES[s], DAY_NAMES[e])),
            (None, None) => Some(with_step(base.to_string())),
            _ => None,
        },
        None => match day_number(base) {
            // `n/step` runs from n to the end of the week
            Some(n) if step.is_some() => day_list(n, n.max(6), step),
            Some(n) => Some(DAY_NAMES[n].to_string()),
            None if base.parse::<u32>().is_ok() => None,
            None => Some(with_step(base.to_string())),
        },
    }
}

/// Comma-separated names for `start..=end` by `step`, Sunday listed once
fn day_list(start: usize, end: usize, step: Option<&str>) -> Option<String> {
    let step = match step {
        Some(step) => step.parse::<usize>().ok().filter(|n| *n > 0)?,
        None => 1,
    };

    let mut days: Vec<&str> = Vec::new();
    for name in (start..=end).step_by(step).map(|n| DAY_NAMES[n]) {
        if !days.contains(&name) {
            days.push(name);
        }
    }
    Some(days.join(","))
}

fn day_number(token: &str) -> Option<usize> {
    token.parse::<usize>().ok().filter(|n| *n <= 7)
}
