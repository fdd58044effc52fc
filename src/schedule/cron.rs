//! # Five-field cron expressions.
//!
//! ```text
//! ┌───────────── minute        0-59
//! │ ┌─────────── hour          0-23
//! │ │ ┌───────── day of month  1-31
//! │ │ │ ┌─────── month         1-12 or jan-dec
//! │ │ │ │ ┌───── day of week   0-7 or sun-sat (0 and 7 are Sunday)
//! * * * * *
//! ```
//!
//! Each field accepts `*`, values, ranges `a-b`, steps `*/n` / `a-b/n` / `a/n`
//! and comma-separated lists. The `@hourly`, `@daily`/`@midnight`, `@weekly`,
//! `@monthly` and `@yearly`/`@annually` shorthands are accepted too.
//!
//! When both day-of-month and day-of-week are restricted, a day matches if
//! **either** matches (classic cron semantics); otherwise both must.
//!
//! Expressions are evaluated against local wall-clock time (`NaiveDateTime`).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Years searched by [`CronExpr::next_after`] before giving up.
const SEARCH_YEARS: i32 = 5;

/// A parsed cron expression.
#[derive(Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    days_any: bool,
    weekdays_any: bool,
}

/// Error returned by [`CronExpr::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronParseError(String);

impl fmt::Display for CronParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CronParseError {}

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    names_base: u32,
}

const MINUTE: Field = Field { name: "minute", min: 0, max: 59, names: &[], names_base: 0 };
const HOUR: Field = Field { name: "hour", min: 0, max: 23, names: &[], names_base: 0 };
const DAY: Field = Field { name: "day of month", min: 1, max: 31, names: &[], names_base: 0 };
const MONTH: Field = Field { name: "month", min: 1, max: 12, names: &MONTHS, names_base: 1 };
const WEEKDAY: Field = Field { name: "day of week", min: 0, max: 7, names: &WEEKDAYS, names_base: 0 };

impl CronExpr {
    /// Parses a five-field expression or an `@` shorthand.
    ///
    /// # Example
    /// ```
    /// use procvisor::CronExpr;
    ///
    /// assert!(CronExpr::parse("0 * * * *").is_ok());
    /// assert!(CronExpr::parse("*/15 9-17 * * mon-fri").is_ok());
    /// assert!(CronExpr::parse("61 * * * *").is_err());
    /// ```
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let trimmed = expr.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            "@weekly" => "0 0 * * 0",
            "@monthly" => "0 0 1 * *",
            "@yearly" | "@annually" => "0 0 1 1 *",
            s if s.starts_with('@') => {
                return Err(CronParseError(format!("unknown shorthand {trimmed:?}")));
            }
            _ => trimmed,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError(format!(
                "expected 5 fields (minute hour day month weekday), got {}",
                fields.len()
            )));
        }

        let mut weekdays = parse_field(fields[4], &WEEKDAY)?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            minutes: parse_field(fields[0], &MINUTE)?,
            hours: parse_field(fields[1], &HOUR)?,
            days: parse_field(fields[2], &DAY)?,
            months: parse_field(fields[3], &MONTH)?,
            weekdays,
            days_any: fields[2] == "*",
            weekdays_any: fields[4] == "*",
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if the minute containing `t` matches.
    pub fn matches(&self, t: NaiveDateTime) -> bool {
        has(self.months, t.month())
            && self.day_matches(t.date())
            && has(self.hours, t.hour())
            && has(self.minutes, t.minute())
    }

    /// First matching minute strictly after `after`, or `None` if the expression
    /// never matches within the search horizon (e.g. `0 0 30 2 *`).
    ///
    /// # Example
    /// ```
    /// use chrono::NaiveDate;
    /// use procvisor::CronExpr;
    ///
    /// let hourly = CronExpr::parse("0 * * * *").unwrap();
    /// let t = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
    /// let next = hourly.next_after(t).unwrap();
    /// assert_eq!(next, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(11, 0, 0).unwrap());
    /// ```
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after.with_second(0)?.with_nanosecond(0)? + TimeDelta::minutes(1);
        let limit = t.year() + SEARCH_YEARS;

        while t.year() <= limit {
            if !has(self.months, t.month()) {
                t = first_of_next_month(t.date())?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !has(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + TimeDelta::hours(1);
                continue;
            }
            if !has(self.minutes, t.minute()) {
                t += TimeDelta::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = has(self.days, date.day());
        let dow = has(self.weekdays, date.weekday().num_days_from_sunday());
        if self.days_any || self.weekdays_any {
            dom && dow
        } else {
            dom || dow
        }
    }
}

impl FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronExpr::parse(s)
    }
}

impl fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpr").field(&self.source).finish()
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[inline]
fn has(set: u64, v: u32) -> bool {
    set & (1u64 << v) != 0
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn parse_field(text: &str, field: &Field) -> Result<u64, CronParseError> {
    let mut set = 0u64;
    for item in text.split(',') {
        set |= parse_item(item, field)?;
    }
    Ok(set)
}

fn parse_item(item: &str, field: &Field) -> Result<u64, CronParseError> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step.parse().map_err(|_| {
                CronParseError(format!("{}: invalid step {step:?}", field.name))
            })?;
            if step == 0 {
                return Err(CronParseError(format!("{}: step must be > 0", field.name)));
            }
            (range, Some(step))
        }
        None => (item, None),
    };

    let (lo, hi) = if range == "*" {
        (field.min, field.max)
    } else if let Some((a, b)) = range.split_once('-') {
        (parse_value(a, field)?, parse_value(b, field)?)
    } else {
        let v = parse_value(range, field)?;
        // `a/n` runs from `a` to the end of the field.
        if step.is_some() { (v, field.max) } else { (v, v) }
    };

    if lo > hi {
        return Err(CronParseError(format!(
            "{}: range {lo}-{hi} is backwards",
            field.name
        )));
    }

    let step = step.unwrap_or(1);
    let mut set = 0u64;
    let mut v = lo;
    while v <= hi {
        set |= 1u64 << v;
        v += step;
    }
    Ok(set)
}

fn parse_value(text: &str, field: &Field) -> Result<u32, CronParseError> {
    let lower = text.to_ascii_lowercase();
    let value = match field.names.iter().position(|n| *n == lower) {
        Some(idx) => idx as u32 + field.names_base,
        None => text.parse::<u32>().map_err(|_| {
            CronParseError(format!("{}: invalid value {text:?}", field.name))
        })?,
    };
    if value < field.min || value > field.max {
        return Err(CronParseError(format!(
            "{}: {value} out of range {}-{}",
            field.name, field.min, field.max
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_hourly_next_after() {
        let cron = CronExpr::parse("0 * * * *").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 1, 10, 30)), Some(at(2026, 1, 1, 11, 0)));
        assert_eq!(cron.next_after(at(2026, 1, 1, 11, 0)), Some(at(2026, 1, 1, 12, 0)));
        assert_eq!(cron.next_after(at(2026, 12, 31, 23, 59)), Some(at(2027, 1, 1, 0, 0)));
    }

    #[test]
    fn test_seconds_are_ignored() {
        let cron = CronExpr::parse("0 * * * *").unwrap();
        let t = at(2026, 1, 1, 10, 59).with_second(42).unwrap();
        assert_eq!(cron.next_after(t), Some(at(2026, 1, 1, 11, 0)));
    }

    #[test]
    fn test_steps_ranges_and_lists() {
        let cron = CronExpr::parse("*/20 9-10,14 * * *").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 1, 8, 0)), Some(at(2026, 1, 1, 9, 0)));
        assert_eq!(cron.next_after(at(2026, 1, 1, 9, 45)), Some(at(2026, 1, 1, 10, 0)));
        assert_eq!(cron.next_after(at(2026, 1, 1, 10, 40)), Some(at(2026, 1, 1, 14, 0)));
        assert_eq!(cron.next_after(at(2026, 1, 1, 14, 40)), Some(at(2026, 1, 2, 9, 0)));
    }

    #[test]
    fn test_weekday_names_and_sunday_seven() {
        // 2026-01-03 is a Saturday.
        let cron = CronExpr::parse("30 6 * * 7").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 3, 0, 0)), Some(at(2026, 1, 4, 6, 30)));

        let cron = CronExpr::parse("0 0 * * mon-fri").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 3, 0, 0)), Some(at(2026, 1, 5, 0, 0)));
    }

    #[test]
    fn test_day_of_month_or_weekday() {
        // 1st of the month OR any Monday.
        let cron = CronExpr::parse("0 0 1 * mon").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 2, 0, 0)), Some(at(2026, 1, 5, 0, 0)));
        assert_eq!(cron.next_after(at(2026, 1, 26, 0, 0)), Some(at(2026, 2, 1, 0, 0)));
    }

    #[test]
    fn test_month_names_and_shorthands() {
        let cron = CronExpr::parse("0 0 1 jun *").unwrap();
        assert_eq!(cron.next_after(at(2026, 7, 1, 0, 0)), Some(at(2027, 6, 1, 0, 0)));

        let hourly = CronExpr::parse("@hourly").unwrap();
        assert!(hourly.matches(at(2026, 5, 5, 5, 0)));
        assert!(!hourly.matches(at(2026, 5, 5, 5, 1)));
    }

    #[test]
    fn test_impossible_date_gives_none() {
        let cron = CronExpr::parse("0 0 30 2 *").unwrap();
        assert_eq!(cron.next_after(at(2026, 1, 1, 0, 0)), None);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "* * * *",
            "* * * * * *",
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "*/0 * * * *",
            "5-1 * * * *",
            "abc * * * *",
            "@sometimes",
        ] {
            assert!(CronExpr::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }
}
