//! Tracked people and groups.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates::MonthDay;
use crate::error::ValidationError;

/// A tracked person's birthday.
///
/// `reminder_offsets` is empty when the user never set per-person offsets;
/// [`BirthdayRecord::effective_offsets`] then yields `{0}` (day-of only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayRecord {
    pub id: String,
    pub name: String,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub reminder_offsets: BTreeSet<u32>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl BirthdayRecord {
    /// Create a record with a fresh id.
    ///
    /// # Errors
    /// Returns an error if the name is blank or `(month, day)` is not a valid
    /// pattern.
    pub fn new(name: &str, month: u32, day: u32) -> Result<Self, ValidationError> {
        let record = Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            month,
            day,
            year: None,
            reminder_offsets: BTreeSet::new(),
            group_id: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_offsets(mut self, offsets: impl IntoIterator<Item = u32>) -> Self {
        self.reminder_offsets = offsets.into_iter().collect();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Check the record invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        MonthDay::new(self.month, self.day)?;
        Ok(())
    }

    pub fn month_day(&self) -> Result<MonthDay, ValidationError> {
        MonthDay::new(self.month, self.day)
    }

    /// Offsets to remind at; `{0}` when none were set.
    pub fn effective_offsets(&self) -> BTreeSet<u32> {
        if self.reminder_offsets.is_empty() {
            BTreeSet::from([0])
        } else {
            self.reminder_offsets.clone()
        }
    }
}

/// Convert user-supplied offsets, rejecting negatives. Duplicates collapse.
pub fn offsets_from_signed(
    offsets: impl IntoIterator<Item = i64>,
) -> Result<BTreeSet<u32>, ValidationError> {
    offsets
        .into_iter()
        .map(|o| u32::try_from(o).map_err(|_| ValidationError::InvalidOffset(o)))
        .collect()
}

/// A named collection of people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Group {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
        })
    }
}

/// One row of the upcoming-birthdays list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upcoming {
    pub person: BirthdayRecord,
    pub next: NaiveDate,
    pub days_until: u32,
    /// Age on `next`, when the birth year is known.
    pub turning: Option<i32>,
    pub is_today: bool,
}

/// Birthdays ordered by how soon they occur.
///
/// `within_days` limits the list to occurrences at most that many days
/// away. Records with an invalid pattern are skipped.
pub fn upcoming(
    people: &[BirthdayRecord],
    today: NaiveDate,
    within_days: Option<u32>,
) -> Vec<Upcoming> {
    let mut rows: Vec<Upcoming> = people
        .iter()
        .filter_map(|person| {
            let pattern = match person.month_day() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(person_id = %person.id, error = %e, "skipping invalid birthday");
                    return None;
                }
            };
            let next = pattern.next_occurrence(today)?;
            let days_until = pattern.days_until(today)?;
            Some(Upcoming {
                person: person.clone(),
                next,
                days_until,
                turning: person.year.map(|y| next.year() - y),
                is_today: pattern.is_today(today),
            })
        })
        .filter(|row| within_days.map_or(true, |limit| row.days_until <= limit))
        .collect();

    rows.sort_by(|a, b| {
        a.days_until
            .cmp(&b.days_until)
            .then_with(|| a.person.name.cmp(&b.person.name))
    });
    rows
}
