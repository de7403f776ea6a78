//! Session owner for the reminder pipeline.
//!
//! The host (CLI, desktop shell, mobile bridge) calls into the coordinator
//! on lifecycle events instead of triggering rebuilds ad hoc:
//!
//! ```text
//! start()                -> permission, preference, people, migration
//! people_changed()       -> rebuild
//! set_days_before(d)     -> save, then rebuild
//! request_permission()   -> prompt, then rebuild if granted
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::migration::{MigrationGuard, MigrationOutcome};
use crate::notify::{NotificationScheduler, NotificationService, PermissionState, ScheduleOutcome};
use crate::preference::{DaysBefore, PreferenceStore};
use crate::reminder::ReminderPolicy;
use crate::store::{FlagStore, RecordStore};

/// State after [`ReminderCoordinator::start`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartReport {
    pub permission: PermissionState,
    pub days_before: DaysBefore,
    pub people: usize,
    pub migration: MigrationOutcome,
}

pub struct ReminderCoordinator {
    records: Arc<dyn RecordStore>,
    preferences: PreferenceStore,
    scheduler: NotificationScheduler,
    migration: MigrationGuard,
    user_id: String,
}

impl ReminderCoordinator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        flags: Arc<dyn FlagStore>,
        service: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            preferences: PreferenceStore::new(records.clone(), user_id.clone()),
            records,
            scheduler: NotificationScheduler::new(service, clock, policy),
            migration: MigrationGuard::new(flags),
            user_id,
        }
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn migration(&self) -> &MigrationGuard {
        &self.migration
    }

    /// Bring the session up and run the pending migration, if any.
    ///
    /// When permission turns out not to be granted, the registry is wiped so
    /// entries scheduled under an earlier grant do not linger. A failed
    /// permission query is logged and leaves the state `Unknown`; the
    /// migration then waits for a later call.
    ///
    /// # Errors
    /// Returns an error if the people list cannot be loaded.
    pub async fn start(&self) -> Result<StartReport> {
        if let Err(e) = self.scheduler.refresh_permission().await {
            tracing::warn!(error = %e, "could not determine notification permission");
        }

        let days_before = self.preferences.load().await;
        self.scheduler.set_days_before(days_before);

        let people = self.records.list_people(&self.user_id).await?;
        let permission = self.scheduler.permission();
        let migration = self
            .migration
            .run_once(&people, permission, &self.scheduler)
            .await;

        if permission.is_known()
            && !permission.is_granted()
            && migration != MigrationOutcome::Completed
        {
            if let Err(e) = self.scheduler.schedule_all(&people).await {
                tracing::warn!(error = %e, "failed to clear notification registry");
            }
        }

        Ok(StartReport {
            permission,
            days_before,
            people: people.len(),
            migration,
        })
    }

    /// Rebuild after people were added, edited, or removed.
    pub async fn people_changed(&self) -> Result<ScheduleOutcome> {
        let people = self.records.list_people(&self.user_id).await?;
        let outcome = self.scheduler.schedule_all(&people).await?;
        // A first person after an empty start may unblock the migration.
        self.migration
            .run_once(&people, self.scheduler.permission(), &self.scheduler)
            .await;
        Ok(outcome)
    }

    /// Save a new preference and rebuild with it.
    ///
    /// # Errors
    /// A failed save is returned as-is and nothing is rescheduled.
    pub async fn set_days_before(&self, days_before: DaysBefore) -> Result<ScheduleOutcome> {
        self.preferences.save(days_before).await?;
        self.scheduler.set_days_before(days_before);
        self.people_changed().await
    }

    /// Prompt for permission; rebuild when it ends up granted.
    pub async fn request_permission(&self) -> Result<bool> {
        let granted = self.scheduler.request_permission().await?;
        if granted {
            self.people_changed().await?;
        }
        Ok(granted)
    }
}
