//! Recurring month/day arithmetic.
//!
//! A birthday is a `(month, day)` pattern that recurs every year, optionally
//! anchored to a birth year. All functions here work on local calendar days
//! (`NaiveDate`); time of day never enters the calculation.
//!
//! ## Leap days
//!
//! February 29 is a valid pattern. A non-leap current year is skipped
//! entirely; the search moves to next year, where a missing February 29
//! falls on February 28:
//!
//! ```text
//! today = 2024-03-01, pattern = 02-29  ->  2025-02-28
//! today = 2023-01-01, pattern = 02-29  ->  2024-02-29
//! today = 2022-01-01, pattern = 02-29  ->  2023-02-28
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Maximum day for `month`, treating February as 29 days long.
pub fn max_day(month: u32) -> Option<u32> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        4 | 6 | 9 | 11 => Some(30),
        2 => Some(29),
        _ => None,
    }
}

/// Full English month name for 1-based `month`.
pub fn month_name(month: u32) -> Option<&'static str> {
    let idx = month.checked_sub(1)? as usize;
    MONTH_NAMES.get(idx).copied()
}

/// A validated recurring `(month, day)` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Validate and build a pattern. February accepts day 29.
    pub fn new(month: u32, day: u32) -> Result<Self, ValidationError> {
        let max = max_day(month).ok_or(ValidationError::InvalidMonth(month))?;
        if day == 0 || day > max {
            return Err(ValidationError::InvalidDay { month, day });
        }
        Ok(Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn is_leap_day(&self) -> bool {
        self.month == 2 && self.day == 29
    }

    /// The occurrence of this pattern in `year`.
    ///
    /// Feb 29 becomes Feb 28 in non-leap years. Returns `None` only when
    /// `year` is outside the representable calendar range.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        let day = if self.is_leap_day() && !is_leap_year(year) {
            28
        } else {
            self.day
        };
        NaiveDate::from_ymd_opt(year, self.month, day)
    }

    /// First occurrence on or after `today`.
    ///
    /// Feb 29 is only matched in the current year when that year is a leap
    /// year; the Feb 28 substitution applies to the following year.
    pub fn next_occurrence(&self, today: NaiveDate) -> Option<NaiveDate> {
        let year = today.year();
        if !self.is_leap_day() || is_leap_year(year) {
            let candidate = self.in_year(year)?;
            if candidate >= today {
                return Some(candidate);
            }
        }
        self.in_year(year + 1)
    }

    /// Calendar days from `today` to the next occurrence; 0 when it is today.
    pub fn days_until(&self, today: NaiveDate) -> Option<u32> {
        let next = self.next_occurrence(today)?;
        u32::try_from((next - today).num_days()).ok()
    }

    /// Literal month/day match, without leap-day substitution.
    pub fn is_today(&self, today: NaiveDate) -> bool {
        today.month() == self.month && today.day() == self.day
    }
}

fn out_of_range(today: NaiveDate) -> ValidationError {
    ValidationError::InvalidValue {
        field: "today".to_string(),
        message: format!("{today} is outside the supported calendar range"),
    }
}

/// Next calendar date (today or later) on which `(month, day)` occurs.
pub fn next_occurrence(month: u32, day: u32, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    MonthDay::new(month, day)?
        .next_occurrence(today)
        .ok_or_else(|| out_of_range(today))
}

/// Days from `today` until the next occurrence of `(month, day)`.
pub fn days_until(month: u32, day: u32, today: NaiveDate) -> Result<u32, ValidationError> {
    MonthDay::new(month, day)?
        .days_until(today)
        .ok_or_else(|| out_of_range(today))
}

/// The age a person turns on their next birthday.
///
/// This is deliberately the upcoming age, not the current one: on
/// 2024-01-01 someone born 1990-06-15 yields 34. `None` without a birth year.
pub fn age_on_next_occurrence(
    birth_year: Option<i32>,
    month: u32,
    day: u32,
    today: NaiveDate,
) -> Result<Option<i32>, ValidationError> {
    let Some(birth_year) = birth_year else {
        return Ok(None);
    };
    let next = next_occurrence(month, day, today)?;
    Ok(Some(next.year() - birth_year))
}

/// True iff today's month and day equal `(month, day)` exactly.
pub fn is_today(month: u32, day: u32, today: NaiveDate) -> bool {
    today.month() == month && today.day() == day
}

/// `"June 15"` or `"June 15, 1990"`.
pub fn format_date(month: u32, day: u32, year: Option<i32>) -> String {
    let name = month_name(month).unwrap_or("Unknown");
    match year {
        Some(year) => format!("{name} {day}, {year}"),
        None => format!("{name} {day}"),
    }
}
