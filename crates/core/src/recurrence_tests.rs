// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid test timestamp")
}

#[parameterized(
    hourly = { "hourly", 3600 },
    daily = { "daily", 86400 },
    weekly = { "weekly", 604800 },
    every_seconds = { "every 90s", 90 },
    every_minutes = { "every 30m", 1800 },
    every_hours = { "every 2h", 7200 },
    every_days = { "every 3d", 259200 },
    case_insensitive = { "Daily", 86400 },
)]
fn parses_and_advances(descriptor: &str, seconds: i64) {
    let rec: Recurrence = descriptor.parse().expect("should parse");
    let prev = start();
    assert_eq!(rec.next_after(prev) - prev, Duration::seconds(seconds));
}

#[parameterized(
    empty = { "" },
    garbage = { "fortnightly" },
    missing_unit = { "every 30" },
    missing_number = { "every m" },
    zero = { "every 0m" },
    bad_unit = { "every 3y" },
)]
fn rejects_bad_descriptors(descriptor: &str) {
    assert!(descriptor.parse::<Recurrence>().is_err());
}

#[test]
fn next_after_is_strictly_later() {
    let prev = start();
    let rec: Recurrence = "every 5m".parse().expect("should parse");
    assert!(rec.next_after(prev) > prev);
}
