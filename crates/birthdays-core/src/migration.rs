//! One-time forced rebuild of the notification registry.
//!
//! Installations that scheduled notifications under an older key scheme or
//! category set keep those stale entries until something wipes them. The
//! guard runs one full rebuild per installation per [`NotificationMigration`]
//! and remembers it in the [`FlagStore`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::notify::{NotificationScheduler, PermissionState, ScheduleOutcome};
use crate::person::BirthdayRecord;
use crate::store::FlagStore;

const DONE: &str = "done";

/// Shape versions of the desired notification set.
///
/// Add a variant and point [`NotificationMigration::CURRENT`] at it whenever
/// the keys, categories, or fire rules produced by
/// [`ReminderPolicy`](crate::reminder::ReminderPolicy) change. Never reuse or
/// rename an existing variant's flag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMigration {
    /// Celebration notification keyed by person id.
    V1Celebration,
    /// Adds the `{id}-reminder` advance reminder.
    V2AdvanceReminders,
}

impl NotificationMigration {
    pub const CURRENT: NotificationMigration = NotificationMigration::V2AdvanceReminders;

    pub fn flag_key(self) -> &'static str {
        match self {
            NotificationMigration::V1Celebration => "notification_migration_v1_celebration",
            NotificationMigration::V2AdvanceReminders => {
                "notification_migration_v2_advance_reminders"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Permission or people not known yet; try again on the next change.
    Waiting,
    /// Another invocation is running.
    InFlight,
    AlreadyDone,
    Completed,
    /// The rebuild did not finish; the flag was left unset.
    Failed,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct MigrationGuard {
    flags: Arc<dyn FlagStore>,
    version: NotificationMigration,
    in_flight: AtomicBool,
    done: AtomicBool,
}

impl MigrationGuard {
    pub fn new(flags: Arc<dyn FlagStore>) -> Self {
        Self::for_version(flags, NotificationMigration::CURRENT)
    }

    pub fn for_version(flags: Arc<dyn FlagStore>, version: NotificationMigration) -> Self {
        Self {
            flags,
            version,
            in_flight: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> NotificationMigration {
        self.version
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Run the rebuild if this installation has not done it yet.
    ///
    /// Safe to call on every state change. Never returns an error: failures
    /// are logged and leave the flag unset so a later call retries.
    pub async fn run_once(
        &self,
        people: &[BirthdayRecord],
        permission: PermissionState,
        scheduler: &NotificationScheduler,
    ) -> MigrationOutcome {
        if self.is_done() {
            return MigrationOutcome::AlreadyDone;
        }
        if !permission.is_known() || people.is_empty() {
            return MigrationOutcome::Waiting;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return MigrationOutcome::InFlight;
        }
        let _in_flight = InFlightGuard(&self.in_flight);
        let key = self.version.flag_key();

        match self.flags.get_flag(key).await {
            Ok(Some(value)) if value == DONE => {
                self.done.store(true, Ordering::SeqCst);
                return MigrationOutcome::AlreadyDone;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(version = key, error = %e, "failed to read migration flag");
                return MigrationOutcome::Failed;
            }
        }

        tracing::info!(version = key, people = people.len(), "running notification migration");
        let report = match scheduler.schedule_all(people).await {
            Ok(ScheduleOutcome::Completed(report)) => report,
            Ok(ScheduleOutcome::Superseded) => {
                tracing::debug!(version = key, "migration rebuild superseded; will retry");
                return MigrationOutcome::Waiting;
            }
            Err(e) => {
                tracing::error!(version = key, error = %e, "notification migration failed");
                return MigrationOutcome::Failed;
            }
        };

        if !report.is_complete() {
            tracing::error!(
                version = key,
                failed = report.failed.len(),
                "notification migration incomplete; will retry"
            );
            return MigrationOutcome::Failed;
        }

        if let Err(e) = self.flags.set_flag(key, DONE).await {
            tracing::error!(version = key, error = %e, "failed to persist migration flag");
            return MigrationOutcome::Failed;
        }
        self.done.store(true, Ordering::SeqCst);
        tracing::info!(version = key, "notification migration complete");
        MigrationOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{CoreError, DatabaseError, Result};
    use crate::notify::testing::MemoryNotificationService;
    use crate::notify::SystemPermission;
    use crate::preference::DaysBefore;
    use crate::reminder::ReminderPolicy;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryFlags {
        values: Mutex<HashMap<String, String>>,
        fail_writes: Mutex<bool>,
    }

    #[async_trait]
    impl FlagStore for MemoryFlags {
        async fn get_flag(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_flag(&self, key: &str, value: &str) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(CoreError::Database(DatabaseError::Locked));
            }
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn people() -> Vec<BirthdayRecord> {
        vec![
            BirthdayRecord::new("Ada", 12, 10).unwrap(),
            BirthdayRecord::new("Grace", 12, 9).unwrap(),
        ]
    }

    async fn scheduler(service: &MemoryNotificationService) -> NotificationScheduler {
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let scheduler =
            NotificationScheduler::new(Arc::new(service.clone()), clock, ReminderPolicy::default());
        scheduler.set_days_before(DaysBefore::OneDay);
        scheduler.refresh_permission().await.unwrap();
        scheduler
    }

    #[tokio::test]
    async fn runs_exactly_once() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;
        let guard = MigrationGuard::new(flags.clone());
        let people = people();

        let outcomes = [
            guard.run_once(&people, scheduler.permission(), &scheduler).await,
            guard.run_once(&people, scheduler.permission(), &scheduler).await,
            guard.run_once(&people, scheduler.permission(), &scheduler).await,
        ];

        assert_eq!(
            outcomes,
            [
                MigrationOutcome::Completed,
                MigrationOutcome::AlreadyDone,
                MigrationOutcome::AlreadyDone
            ]
        );
        assert_eq!(service.cancel_count(), 1);
        assert_eq!(service.schedule_count(), 4);
        assert_eq!(
            flags.get_flag(NotificationMigration::CURRENT.flag_key()).await.unwrap(),
            Some("done".to_string())
        );
    }

    #[tokio::test]
    async fn persisted_flag_survives_restart() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;

        MigrationGuard::new(flags.clone())
            .run_once(&people(), PermissionState::Granted, &scheduler)
            .await;
        let fresh = MigrationGuard::new(flags.clone());
        let outcome = fresh.run_once(&people(), PermissionState::Granted, &scheduler).await;

        assert_eq!(outcome, MigrationOutcome::AlreadyDone);
        assert!(fresh.is_done());
        assert_eq!(service.cancel_count(), 1);
    }

    #[tokio::test]
    async fn waits_for_permission_and_people() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;
        let guard = MigrationGuard::new(flags.clone());

        assert_eq!(
            guard.run_once(&people(), PermissionState::Unknown, &scheduler).await,
            MigrationOutcome::Waiting
        );
        assert_eq!(
            guard.run_once(&people(), PermissionState::Checking, &scheduler).await,
            MigrationOutcome::Waiting
        );
        assert_eq!(
            guard.run_once(&[], PermissionState::Granted, &scheduler).await,
            MigrationOutcome::Waiting
        );
        assert_eq!(service.cancel_count(), 0);
        assert!(flags.values.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_leaves_flag_unset_and_retries() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;
        let guard = MigrationGuard::new(flags.clone());

        service.set_fail_cancel(true);
        assert_eq!(
            guard.run_once(&people(), PermissionState::Granted, &scheduler).await,
            MigrationOutcome::Failed
        );
        assert!(!guard.is_done());

        service.clear_failures();
        assert_eq!(
            guard.run_once(&people(), PermissionState::Granted, &scheduler).await,
            MigrationOutcome::Completed
        );
    }

    #[tokio::test]
    async fn partial_schedule_failure_is_retried() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;
        let people = people();
        service.fail_key(&people[0].id);
        let guard = MigrationGuard::new(flags.clone());

        assert_eq!(
            guard.run_once(&people, PermissionState::Granted, &scheduler).await,
            MigrationOutcome::Failed
        );
        assert!(flags.values.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn flag_write_failure_is_not_done() {
        let flags = Arc::new(MemoryFlags::default());
        *flags.fail_writes.lock().unwrap() = true;
        let service = MemoryNotificationService::granted();
        let scheduler = scheduler(&service).await;
        let guard = MigrationGuard::new(flags.clone());

        assert_eq!(
            guard.run_once(&people(), PermissionState::Granted, &scheduler).await,
            MigrationOutcome::Failed
        );
        assert!(!guard.is_done());
    }

    #[tokio::test]
    async fn denied_permission_still_completes() {
        let flags = Arc::new(MemoryFlags::default());
        let service = MemoryNotificationService::new(SystemPermission::Denied);
        let scheduler = scheduler(&service).await;
        let guard = MigrationGuard::new(flags.clone());

        assert_eq!(
            guard.run_once(&people(), scheduler.permission(), &scheduler).await,
            MigrationOutcome::Completed
        );
        assert_eq!(service.schedule_count(), 0);
        assert!(service.keys().is_empty());
    }

    #[test]
    fn flag_keys_are_distinct() {
        assert_ne!(
            NotificationMigration::V1Celebration.flag_key(),
            NotificationMigration::V2AdvanceReminders.flag_key()
        );
    }
}
