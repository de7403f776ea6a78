//! Maps a person and the reminder preference to the notifications that
//! should exist for them.
//!
//! Every person gets a celebration notification keyed by their id. An
//! advance reminder keyed `{id}-reminder` is added when the global
//! preference is above zero. Keys are stable, so the registry never holds
//! more than two entries per person in the default mode.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::person::BirthdayRecord;
use crate::preference::DaysBefore;

/// Yearly calendar trigger in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarRule {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub repeats_yearly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Celebration,
    AdvanceReminder { days_before: u32 },
}

/// One notification the registry should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredNotification {
    pub key: String,
    pub person_id: String,
    pub kind: NotificationKind,
    pub rule: CalendarRule,
    pub payload: NotificationPayload,
}

/// Which offsets drive the advance reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMode {
    /// One `{id}-reminder` entry from the global preference.
    #[default]
    GlobalOnly,
    /// One `{id}-{offset}` entry per positive offset of the person, falling
    /// back to the global preference when the person has none.
    PerPerson,
}

/// Local time of day at which reminders fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireTime {
    hour: u32,
    minute: u32,
}

impl FireTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::InvalidValue {
                field: "hour".to_string(),
                message: format!("{hour} is not in 0-23"),
            });
        }
        if minute > 59 {
            return Err(ValidationError::InvalidValue {
                field: "minute".to_string(),
                message: format!("{minute} is not in 0-59"),
            });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl Default for FireTime {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

pub fn celebration_key(person_id: &str) -> String {
    person_id.to_string()
}

pub fn reminder_key(person_id: &str) -> String {
    format!("{person_id}-reminder")
}

pub fn offset_key(person_id: &str, offset: u32) -> String {
    format!("{person_id}-{offset}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderPolicy {
    mode: ReminderMode,
    fire_time: FireTime,
}

impl ReminderPolicy {
    pub fn new(mode: ReminderMode, fire_time: FireTime) -> Self {
        Self { mode, fire_time }
    }

    pub fn mode(&self) -> ReminderMode {
        self.mode
    }

    /// Notifications wanted for `person` given the global preference.
    ///
    /// `today` anchors the advance-reminder date: it is computed from the
    /// next occurrence and then repeats yearly on that month/day.
    ///
    /// # Errors
    /// Returns an error if the person's birthday is not a valid pattern.
    pub fn desired_notifications(
        &self,
        person: &BirthdayRecord,
        days_before: DaysBefore,
        today: NaiveDate,
    ) -> Result<Vec<DesiredNotification>, ValidationError> {
        let pattern = person.month_day()?;
        let mut wanted = vec![self.celebration(person)];

        let offsets: Vec<u32> = match self.mode {
            ReminderMode::GlobalOnly => {
                if days_before.is_advance() {
                    vec![days_before.days()]
                } else {
                    Vec::new()
                }
            }
            ReminderMode::PerPerson => {
                if person.reminder_offsets.is_empty() {
                    vec![days_before.days()]
                } else {
                    person.reminder_offsets.iter().copied().collect()
                }
            }
        };

        let next = pattern
            .next_occurrence(today)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "today".to_string(),
                message: format!("{today} is outside the supported calendar range"),
            })?;

        for offset in offsets.into_iter().filter(|o| *o > 0) {
            let fire_on = next
                .checked_sub_days(Days::new(u64::from(offset)))
                .ok_or(ValidationError::InvalidOffset(i64::from(offset)))?;
            let key = match self.mode {
                ReminderMode::GlobalOnly => reminder_key(&person.id),
                ReminderMode::PerPerson => offset_key(&person.id, offset),
            };
            wanted.push(self.advance(person, key, offset, fire_on));
        }

        Ok(wanted)
    }

    fn celebration(&self, person: &BirthdayRecord) -> DesiredNotification {
        DesiredNotification {
            key: celebration_key(&person.id),
            person_id: person.id.clone(),
            kind: NotificationKind::Celebration,
            rule: CalendarRule {
                month: person.month,
                day: person.day,
                hour: self.fire_time.hour,
                minute: self.fire_time.minute,
                repeats_yearly: true,
            },
            payload: NotificationPayload {
                title: format!("Happy Birthday {}! 🎉", person.name),
                body: format!("Today is {}'s birthday. Send them some love!", person.name),
            },
        }
    }

    fn advance(
        &self,
        person: &BirthdayRecord,
        key: String,
        offset: u32,
        fire_on: NaiveDate,
    ) -> DesiredNotification {
        let when = if offset == 1 {
            "tomorrow".to_string()
        } else {
            format!("in {offset} days")
        };
        DesiredNotification {
            key,
            person_id: person.id.clone(),
            kind: NotificationKind::AdvanceReminder { days_before: offset },
            rule: CalendarRule {
                month: fire_on.month(),
                day: fire_on.day(),
                hour: self.fire_time.hour,
                minute: self.fire_time.minute,
                repeats_yearly: true,
            },
            payload: NotificationPayload {
                title: format!("Upcoming birthday: {}", person.name),
                body: format!("{}'s birthday is {when}.", person.name),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn person() -> BirthdayRecord {
        let mut p = BirthdayRecord::new("Ada", 3, 5).unwrap();
        p.id = "p1".to_string();
        p
    }

    #[test]
    fn day_of_only_when_preference_is_zero() {
        let wanted = ReminderPolicy::default()
            .desired_notifications(&person(), DaysBefore::DayOf, date(2024, 1, 1))
            .unwrap();
        assert_eq!(wanted.len(), 1);
        let celebration = &wanted[0];
        assert_eq!(celebration.key, "p1");
        assert_eq!(celebration.kind, NotificationKind::Celebration);
        assert_eq!(
            celebration.rule,
            CalendarRule { month: 3, day: 5, hour: 8, minute: 0, repeats_yearly: true }
        );
        assert!(celebration.payload.title.contains("Happy Birthday Ada!"));
    }

    #[test]
    fn advance_reminder_crosses_month_boundary() {
        let wanted = ReminderPolicy::default()
            .desired_notifications(&person(), DaysBefore::OneWeek, date(2024, 1, 1))
            .unwrap();
        assert_eq!(wanted.len(), 2);
        let reminder = &wanted[1];
        assert_eq!(reminder.key, "p1-reminder");
        // 2024 is leap: Mar 5 - 7 days = Feb 27.
        assert_eq!((reminder.rule.month, reminder.rule.day), (2, 27));
        assert!(reminder.rule.repeats_yearly);
        assert!(reminder.payload.body.contains("in 7 days"));
    }

    #[test]
    fn one_day_reads_tomorrow() {
        let wanted = ReminderPolicy::default()
            .desired_notifications(&person(), DaysBefore::OneDay, date(2024, 1, 1))
            .unwrap();
        assert_eq!(wanted[1].payload.body, "Ada's birthday is tomorrow.");
    }

    #[test]
    fn global_only_ignores_person_offsets() {
        let p = person().with_offsets([1, 3]);
        let wanted = ReminderPolicy::default()
            .desired_notifications(&p, DaysBefore::OneWeek, date(2024, 1, 1))
            .unwrap();
        let keys: Vec<_> = wanted.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["p1", "p1-reminder"]);
        assert_eq!(
            wanted[1].kind,
            NotificationKind::AdvanceReminder { days_before: 7 }
        );
    }

    #[test]
    fn per_person_mode_uses_own_offsets() {
        let policy = ReminderPolicy::new(ReminderMode::PerPerson, FireTime::default());
        let p = person().with_offsets([0, 1, 3]);
        let wanted = policy
            .desired_notifications(&p, DaysBefore::OneWeek, date(2024, 1, 1))
            .unwrap();
        let keys: Vec<_> = wanted.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["p1", "p1-1", "p1-3"]);
        assert_eq!((wanted[2].rule.month, wanted[2].rule.day), (3, 2));
    }

    #[test]
    fn per_person_mode_falls_back_to_global() {
        let policy = ReminderPolicy::new(ReminderMode::PerPerson, FireTime::default());
        let wanted = policy
            .desired_notifications(&person(), DaysBefore::ThreeDays, date(2024, 1, 1))
            .unwrap();
        let keys: Vec<_> = wanted.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["p1", "p1-3"]);
    }

    #[test]
    fn leap_day_reminder_uses_substituted_date() {
        let mut p = BirthdayRecord::new("Leap", 2, 29).unwrap();
        p.id = "leap".to_string();
        let wanted = ReminderPolicy::default()
            .desired_notifications(&p, DaysBefore::OneDay, date(2025, 1, 1))
            .unwrap();
        // 2025 is skipped; the 2026 occurrence is Feb 28, so the reminder lands on Feb 27.
        assert_eq!((wanted[1].rule.month, wanted[1].rule.day), (2, 27));
        // The celebration keeps the stored pattern.
        assert_eq!((wanted[0].rule.month, wanted[0].rule.day), (2, 29));
    }

    #[test]
    fn custom_fire_time() {
        let policy = ReminderPolicy::new(ReminderMode::GlobalOnly, FireTime::new(19, 30).unwrap());
        let wanted = policy
            .desired_notifications(&person(), DaysBefore::DayOf, date(2024, 1, 1))
            .unwrap();
        assert_eq!((wanted[0].rule.hour, wanted[0].rule.minute), (19, 30));
        assert!(FireTime::new(24, 0).is_err());
        assert!(FireTime::new(8, 60).is_err());
    }
}
