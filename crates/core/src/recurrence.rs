// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurrence descriptors for scheduled tasks.

use chrono::{DateTime, Duration, Utc};

/// Parsed recurrence descriptor.
///
/// Accepted forms: `hourly`, `daily`, `weekly`, and `every <N><s|m|h|d>`
/// (e.g. `every 30m`). Anything else fails to parse and the task simply
/// stops recurring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Hourly,
    Daily,
    Weekly,
    Every(Duration),
}

impl Recurrence {
    /// Compute the next fire time strictly after `prev`.
    pub fn next_after(&self, prev: DateTime<Utc>) -> DateTime<Utc> {
        prev + self.interval()
    }

    fn interval(&self) -> Duration {
        match self {
            Recurrence::Hourly => Duration::hours(1),
            Recurrence::Daily => Duration::days(1),
            Recurrence::Weekly => Duration::weeks(1),
            Recurrence::Every(d) => *d,
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "hourly" => return Ok(Recurrence::Hourly),
            "daily" => return Ok(Recurrence::Daily),
            "weekly" => return Ok(Recurrence::Weekly),
            _ => {}
        }

        let spec = s
            .strip_prefix("every")
            .ok_or_else(|| format!("unknown recurrence: {}", s))?
            .trim();

        let split = spec
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .ok_or_else(|| format!("missing unit in recurrence: {}", s))?;
        let (num_str, unit) = spec.split_at(split);

        let num: i64 = num_str
            .parse()
            .map_err(|_| format!("invalid number in recurrence: {}", s))?;
        if num <= 0 {
            return Err(format!("recurrence interval must be positive: {}", s));
        }

        let interval = match unit.trim() {
            "s" | "sec" | "secs" => Duration::seconds(num),
            "m" | "min" | "mins" => Duration::minutes(num),
            "h" | "hr" | "hrs" => Duration::hours(num),
            "d" | "day" | "days" => Duration::days(num),
            other => return Err(format!("unknown recurrence unit: {}", other)),
        };

        Ok(Recurrence::Every(interval))
    }
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
