use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::calendar::Calendar;

pub const DEFAULT_SCHEDULE: &str = "0 0 10 * * *";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule is empty")]
    Empty,
    #[error("invalid schedule '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// When runs are triggered: a fixed interval, or a cron expression read in
/// the canonical calendar.
#[derive(Debug, Clone)]
pub enum Schedule {
    Every(Duration),
    Cron(Box<cron::Schedule>),
}

impl Schedule {
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if let Some(every) = parse_duration(trimmed) {
            if every.is_zero() {
                return Err(ScheduleError::Invalid {
                    input: input.to_string(),
                    reason: "interval must be positive".into(),
                });
            }
            return Ok(Schedule::Every(every));
        }
        // five-field expressions carry no seconds field
        let expression = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        cron::Schedule::from_str(&expression)
            .map(|schedule| Schedule::Cron(Box::new(schedule)))
            .map_err(|err| ScheduleError::Invalid {
                input: input.to_string(),
                reason: err.to_string(),
            })
    }

    /// Intervals start with a run; cron schedules wait for their first slot.
    pub fn runs_immediately(&self) -> bool {
        matches!(self, Schedule::Every(_))
    }

    pub fn next_after(&self, now: DateTime<Utc>, calendar: &Calendar) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Every(every) => chrono::Duration::from_std(*every)
                .ok()
                .and_then(|every| now.checked_add_signed(every)),
            Schedule::Cron(schedule) => schedule
                .after(&now.with_timezone(&calendar.timezone()))
                .next()
                .map(|at| at.with_timezone(&Utc)),
        }
    }
}

fn parse_duration(input: &str) -> Option<Duration> {
    let mut digits = String::new();
    let mut unit = String::new();
    for ch in input.chars() {
        if ch.is_ascii_digit() {
            if !unit.is_empty() {
                return None;
            }
            digits.push(ch);
        } else {
            unit.push(ch);
        }
    }
    let value: u64 = digits.parse().ok()?;
    let secs = match unit.as_str() {
        "" | "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        "d" => value.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
