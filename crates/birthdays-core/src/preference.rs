//! The global "remind me N days before" setting.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::store::RecordStore;

/// Allowed advance-reminder offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DaysBefore {
    /// Celebration notification only.
    #[default]
    DayOf,
    OneDay,
    ThreeDays,
    OneWeek,
}

impl DaysBefore {
    pub const ALL: [DaysBefore; 4] = [
        DaysBefore::DayOf,
        DaysBefore::OneDay,
        DaysBefore::ThreeDays,
        DaysBefore::OneWeek,
    ];

    pub fn days(self) -> u32 {
        match self {
            DaysBefore::DayOf => 0,
            DaysBefore::OneDay => 1,
            DaysBefore::ThreeDays => 3,
            DaysBefore::OneWeek => 7,
        }
    }

    /// Whether an advance reminder is wanted at all.
    pub fn is_advance(self) -> bool {
        self.days() > 0
    }
}

impl TryFrom<u32> for DaysBefore {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        DaysBefore::ALL
            .into_iter()
            .find(|d| d.days() == value)
            .ok_or(ValidationError::UnsupportedDaysBefore(value))
    }
}

impl From<DaysBefore> for u32 {
    fn from(value: DaysBefore) -> Self {
        value.days()
    }
}

impl fmt::Display for DaysBefore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

impl FromStr for DaysBefore {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u32 = s.trim().parse().map_err(|_| ValidationError::InvalidValue {
            field: "days_before".to_string(),
            message: format!("'{s}' is not a number"),
        })?;
        DaysBefore::try_from(n)
    }
}

/// Loads and saves the preference for one user.
#[derive(Clone)]
pub struct PreferenceStore {
    records: Arc<dyn RecordStore>,
    user_id: String,
}

impl PreferenceStore {
    pub fn new(records: Arc<dyn RecordStore>, user_id: impl Into<String>) -> Self {
        Self {
            records,
            user_id: user_id.into(),
        }
    }

    /// Read the stored preference.
    ///
    /// Never fails: a missing row, a read error, or an out-of-range stored
    /// value all yield [`DaysBefore::DayOf`].
    pub async fn load(&self) -> DaysBefore {
        match self.records.get_preference(&self.user_id).await {
            Ok(Some(pref)) => DaysBefore::try_from(pref.days_before).unwrap_or_else(|e| {
                tracing::warn!(user_id = %self.user_id, error = %e, "ignoring stored preference");
                DaysBefore::default()
            }),
            Ok(None) => DaysBefore::default(),
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "failed to load preference, using default");
                DaysBefore::default()
            }
        }
    }

    /// Persist a new preference.
    ///
    /// # Errors
    /// Propagates the store's write error so the caller can tell the user
    /// the setting did not stick.
    pub async fn save(&self, days_before: DaysBefore) -> Result<()> {
        self.records.set_preference(&self.user_id, days_before).await?;
        tracing::info!(user_id = %self.user_id, days_before = days_before.days(), "saved reminder preference");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, DatabaseError};
    use crate::person::BirthdayRecord;
    use crate::store::ReminderPreference;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubRecords {
        stored: Mutex<Option<u32>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl RecordStore for StubRecords {
        async fn get_preference(&self, _user_id: &str) -> crate::error::Result<Option<ReminderPreference>> {
            if self.fail_reads {
                return Err(CoreError::Database(DatabaseError::Locked));
            }
            Ok(self
                .stored
                .lock()
                .unwrap()
                .map(|days_before| ReminderPreference { days_before }))
        }

        async fn set_preference(&self, _user_id: &str, days_before: DaysBefore) -> crate::error::Result<()> {
            if self.fail_writes {
                return Err(CoreError::Database(DatabaseError::Locked));
            }
            *self.stored.lock().unwrap() = Some(days_before.days());
            Ok(())
        }

        async fn list_people(&self, _user_id: &str) -> crate::error::Result<Vec<BirthdayRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn only_enumerated_values_parse() {
        assert_eq!(DaysBefore::try_from(7), Ok(DaysBefore::OneWeek));
        assert_eq!(
            DaysBefore::try_from(2),
            Err(ValidationError::UnsupportedDaysBefore(2))
        );
        assert_eq!("3".parse::<DaysBefore>(), Ok(DaysBefore::ThreeDays));
        assert!("soon".parse::<DaysBefore>().is_err());
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&DaysBefore::OneDay).unwrap(), "1");
        assert!(serde_json::from_str::<DaysBefore>("5").is_err());
    }

    #[tokio::test]
    async fn load_defaults_when_absent() {
        let store = PreferenceStore::new(Arc::new(StubRecords::default()), "u1");
        assert_eq!(store.load().await, DaysBefore::DayOf);
    }

    #[tokio::test]
    async fn load_fails_open_on_read_error() {
        let records = StubRecords {
            fail_reads: true,
            ..Default::default()
        };
        let store = PreferenceStore::new(Arc::new(records), "u1");
        assert_eq!(store.load().await, DaysBefore::DayOf);
    }

    #[tokio::test]
    async fn load_ignores_out_of_range_value() {
        let records = StubRecords {
            stored: Mutex::new(Some(42)),
            ..Default::default()
        };
        let store = PreferenceStore::new(Arc::new(records), "u1");
        assert_eq!(store.load().await, DaysBefore::DayOf);
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = PreferenceStore::new(Arc::new(StubRecords::default()), "u1");
        store.save(DaysBefore::ThreeDays).await.unwrap();
        assert_eq!(store.load().await, DaysBefore::ThreeDays);
    }

    #[tokio::test]
    async fn save_surfaces_write_error() {
        let records = StubRecords {
            fail_writes: true,
            ..Default::default()
        };
        let store = PreferenceStore::new(Arc::new(records), "u1");
        assert!(store.save(DaysBefore::OneDay).await.is_err());
    }
}
