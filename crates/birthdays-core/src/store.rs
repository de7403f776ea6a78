//! Storage collaborators consumed by the reminder pipeline.
//!
//! The pipeline never talks to a database directly. It reads people and the
//! reminder preference through [`RecordStore`] and keeps one-shot markers in
//! a [`FlagStore`]. [`crate::storage::Database`] implements both over SQLite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::person::BirthdayRecord;
use crate::preference::DaysBefore;

/// Raw persisted preference row. `days_before` is unchecked here; the
/// [`PreferenceStore`](crate::preference::PreferenceStore) validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPreference {
    pub days_before: u32,
}

/// User-owned rows: people and the global reminder preference.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_preference(&self, user_id: &str) -> Result<Option<ReminderPreference>>;

    async fn set_preference(&self, user_id: &str, days_before: DaysBefore) -> Result<()>;

    async fn list_people(&self, user_id: &str) -> Result<Vec<BirthdayRecord>>;
}

/// Local key-value markers that survive restarts.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get_flag(&self, key: &str) -> Result<Option<String>>;

    async fn set_flag(&self, key: &str, value: &str) -> Result<()>;
}
