use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{NotificationService, PermissionState, PermissionTransitionError, SystemPermission};
use crate::clock::Clock;
use crate::error::{CoreError, NotificationError, Result};
use crate::person::BirthdayRecord;
use crate::preference::DaysBefore;
use crate::reminder::ReminderPolicy;

/// A schedule call that the registry rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedNotification {
    pub key: String,
    pub message: String,
}

/// What one rebuild did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// Permission at the time of the rebuild. Anything but `Granted` means
    /// the registry was only wiped.
    pub permission: PermissionState,
    pub days_before: DaysBefore,
    pub scheduled: Vec<String>,
    pub failed: Vec<FailedNotification>,
    /// People whose record could not be turned into notifications.
    pub skipped: Vec<String>,
}

impl ScheduleReport {
    /// True when every requested schedule call succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScheduleOutcome {
    Completed(ScheduleReport),
    /// A newer request arrived while this one waited; it ran instead.
    Superseded,
}

/// Keeps the notification registry equal to the desired set.
///
/// Every [`schedule_all`](Self::schedule_all) wipes the registry and
/// re-registers everything. Calls are serialized: one rebuild runs at a
/// time, and of the calls queued behind it only the newest runs.
pub struct NotificationScheduler {
    service: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    policy: ReminderPolicy,
    permission: Mutex<PermissionState>,
    days_before: Mutex<DaysBefore>,
    latest_request: AtomicU64,
    rebuild: tokio::sync::Mutex<()>,
}

impl NotificationScheduler {
    pub fn new(
        service: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            service,
            clock,
            policy,
            permission: Mutex::new(PermissionState::Unknown),
            days_before: Mutex::new(DaysBefore::default()),
            latest_request: AtomicU64::new(0),
            rebuild: tokio::sync::Mutex::new(()),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn permission(&self) -> PermissionState {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn days_before(&self) -> DaysBefore {
        *self.days_before.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn policy(&self) -> ReminderPolicy {
        self.policy
    }

    // ── Preference ───────────────────────────────────────────────────

    /// Set the advance-reminder offset used by subsequent rebuilds.
    pub fn set_days_before(&self, days_before: DaysBefore) {
        *self.days_before.lock().unwrap_or_else(|e| e.into_inner()) = days_before;
    }

    // ── Permission ───────────────────────────────────────────────────

    fn transition(&self, to: PermissionState) -> Result<(), PermissionTransitionError> {
        let mut state = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        if !state.can_transition_to(to) {
            return Err(PermissionTransitionError { from: *state, to });
        }
        tracing::debug!(from = ?*state, to = ?to, "permission transition");
        *state = to;
        Ok(())
    }

    /// Query the platform for the current permission.
    ///
    /// `Denied` is sticky for the session and is returned without asking.
    ///
    /// # Errors
    /// Returns an error if the platform query fails; the state falls back
    /// to `Unknown` so the next call retries.
    pub async fn refresh_permission(&self) -> Result<PermissionState> {
        if self.permission() == PermissionState::Denied {
            return Ok(PermissionState::Denied);
        }
        if self.permission() == PermissionState::Checking {
            return Ok(PermissionState::Checking);
        }
        self.transition(PermissionState::Checking)
            .map_err(|e| CoreError::Custom(e.to_string()))?;

        match self.service.permission_state().await {
            Ok(answer) => {
                let next = PermissionState::from(answer);
                self.transition(next)
                    .map_err(|e| CoreError::Custom(e.to_string()))?;
                tracing::info!(permission = ?next, "notification permission checked");
                Ok(next)
            }
            Err(e) => {
                let _ = self.transition(PermissionState::Unknown);
                tracing::warn!(error = %e, "permission query failed");
                Err(e.into())
            }
        }
    }

    /// Prompt for permission when it has not been decided yet.
    ///
    /// Returns whether notifications are granted afterwards. A denied
    /// permission is never re-requested.
    ///
    /// # Errors
    /// Returns an error if the platform query or prompt fails.
    pub async fn request_permission(&self) -> Result<bool> {
        let mut state = self.permission();
        if !state.is_known() {
            state = self.refresh_permission().await?;
        }

        match state {
            PermissionState::Granted => Ok(true),
            PermissionState::Denied => {
                tracing::info!("notifications denied; change this in system settings");
                Ok(false)
            }
            PermissionState::Undetermined => {
                let answer = self.service.request_permission().await?;
                if answer != SystemPermission::Undetermined {
                    self.transition(answer.into())
                        .map_err(|e| CoreError::Custom(e.to_string()))?;
                }
                tracing::info!(permission = ?answer, "notification permission requested");
                Ok(answer == SystemPermission::Granted)
            }
            PermissionState::Unknown | PermissionState::Checking => Ok(false),
        }
    }

    // ── Rebuild ──────────────────────────────────────────────────────

    /// Rebuild the registry for `people`.
    ///
    /// The wipe always completes before any schedule call. Without
    /// permission the registry is left empty. Individual schedule failures
    /// do not stop the loop; they are listed in the report.
    ///
    /// # Errors
    /// Returns [`NotificationError::CancelFailed`] if the wipe fails, in
    /// which case nothing is scheduled.
    pub async fn schedule_all(&self, people: &[BirthdayRecord]) -> Result<ScheduleOutcome> {
        let ticket = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = self.rebuild.lock().await;

        if self.latest_request.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "rebuild superseded by a newer request");
            return Ok(ScheduleOutcome::Superseded);
        }

        self.rebuild_now(people).await.map(ScheduleOutcome::Completed)
    }

    async fn rebuild_now(&self, people: &[BirthdayRecord]) -> Result<ScheduleReport> {
        self.service.cancel_all().await.map_err(|e| {
            tracing::error!(error = %e, "failed to wipe notification registry");
            match e {
                NotificationError::CancelFailed(_) => e,
                other => NotificationError::CancelFailed(other.to_string()),
            }
        })?;

        let permission = self.permission();
        let days_before = self.days_before();
        let mut report = ScheduleReport {
            permission,
            days_before,
            scheduled: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        };

        if !permission.is_granted() {
            tracing::info!(permission = ?permission, "registry wiped; no permission to schedule");
            return Ok(report);
        }

        let today = self.clock.today();
        for person in people {
            let wanted = match self.policy.desired_notifications(person, days_before, today) {
                Ok(wanted) => wanted,
                Err(e) => {
                    tracing::warn!(person_id = %person.id, error = %e, "skipping person");
                    report.skipped.push(person.id.clone());
                    continue;
                }
            };

            for notification in wanted {
                match self
                    .service
                    .schedule(&notification.key, &notification.rule, &notification.payload)
                    .await
                {
                    Ok(()) => report.scheduled.push(notification.key),
                    Err(e) => {
                        tracing::warn!(key = %notification.key, error = %e, "failed to schedule notification");
                        report.failed.push(FailedNotification {
                            key: notification.key,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            people = people.len(),
            scheduled = report.scheduled.len(),
            failed = report.failed.len(),
            days_before = days_before.days(),
            "notification registry rebuilt"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notify::testing::{MemoryNotificationService, RegistryCall};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
    }

    fn people(n: usize) -> Vec<BirthdayRecord> {
        (0..n)
            .map(|i| {
                let mut p = BirthdayRecord::new(&format!("Person {i}"), 1 + (i as u32 % 12), 10).unwrap();
                p.id = format!("p{i}");
                p
            })
            .collect()
    }

    async fn granted_scheduler(service: &MemoryNotificationService) -> NotificationScheduler {
        let scheduler =
            NotificationScheduler::new(Arc::new(service.clone()), clock(), ReminderPolicy::default());
        scheduler.refresh_permission().await.unwrap();
        scheduler
    }

    fn completed(outcome: ScheduleOutcome) -> ScheduleReport {
        match outcome {
            ScheduleOutcome::Completed(report) => report,
            ScheduleOutcome::Superseded => panic!("expected a completed rebuild"),
        }
    }

    #[tokio::test]
    async fn schedules_two_per_person_with_advance_reminder() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        scheduler.set_days_before(DaysBefore::ThreeDays);
        service.reset_calls();

        let report = completed(scheduler.schedule_all(&people(4)).await.unwrap());

        assert_eq!(service.cancel_count(), 1);
        assert_eq!(service.schedule_count(), 8);
        assert_eq!(report.scheduled.len(), 8);
        assert_eq!(service.calls()[0], RegistryCall::CancelAll);
    }

    #[tokio::test]
    async fn schedules_one_per_person_for_day_of() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        service.reset_calls();

        scheduler.schedule_all(&people(5)).await.unwrap();

        assert_eq!(service.cancel_count(), 1);
        assert_eq!(service.schedule_count(), 5);
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        scheduler.set_days_before(DaysBefore::OneWeek);
        let people = people(3);

        scheduler.schedule_all(&people).await.unwrap();
        let first = service.entries();
        scheduler.schedule_all(&people).await.unwrap();

        assert_eq!(service.entries(), first);
        let expected: BTreeSet<String> = ["p0", "p0-reminder", "p1", "p1-reminder", "p2", "p2-reminder"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(service.keys(), expected);
    }

    #[tokio::test]
    async fn lowering_preference_drops_stale_reminders() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        let people = people(2);

        scheduler.set_days_before(DaysBefore::OneDay);
        scheduler.schedule_all(&people).await.unwrap();
        assert_eq!(service.keys().len(), 4);

        scheduler.set_days_before(DaysBefore::DayOf);
        scheduler.schedule_all(&people).await.unwrap();
        assert_eq!(service.keys(), BTreeSet::from(["p0".to_string(), "p1".to_string()]));
    }

    #[tokio::test]
    async fn denied_permission_only_wipes() {
        let service = MemoryNotificationService::new(SystemPermission::Denied);
        let scheduler = granted_scheduler(&service).await;
        assert_eq!(scheduler.permission(), PermissionState::Denied);
        service.reset_calls();

        let report = completed(scheduler.schedule_all(&people(3)).await.unwrap());

        assert_eq!(service.cancel_count(), 1);
        assert_eq!(service.schedule_count(), 0);
        assert_eq!(report.permission, PermissionState::Denied);
        assert!(service.keys().is_empty());
    }

    #[tokio::test]
    async fn unknown_permission_only_wipes() {
        let service = MemoryNotificationService::granted();
        let scheduler =
            NotificationScheduler::new(Arc::new(service.clone()), clock(), ReminderPolicy::default());

        scheduler.schedule_all(&people(2)).await.unwrap();

        assert_eq!(service.cancel_count(), 1);
        assert_eq!(service.schedule_count(), 0);
    }

    #[tokio::test]
    async fn schedule_failure_does_not_stop_the_loop() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        service.fail_key("p0");

        let report = completed(scheduler.schedule_all(&people(3)).await.unwrap());

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "p0");
        assert!(!report.is_complete());
        assert_eq!(service.keys(), BTreeSet::from(["p1".to_string(), "p2".to_string()]));
    }

    #[tokio::test]
    async fn cancel_failure_aborts_before_scheduling() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        service.set_fail_cancel(true);
        service.reset_calls();

        let err = scheduler.schedule_all(&people(2)).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::Notification(NotificationError::CancelFailed(_))
        ));
        assert_eq!(service.schedule_count(), 0);
    }

    #[tokio::test]
    async fn invalid_record_is_skipped() {
        let service = MemoryNotificationService::granted();
        let scheduler = granted_scheduler(&service).await;
        let mut people = people(2);
        people[0].day = 31;
        people[0].month = 4;

        let report = completed(scheduler.schedule_all(&people).await.unwrap());

        assert_eq!(report.skipped, vec!["p0".to_string()]);
        assert_eq!(report.scheduled, vec!["p1".to_string()]);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn overlapping_requests_collapse_to_latest() {
        let service = MemoryNotificationService::granted().with_held_cancels();
        let scheduler = granted_scheduler(&service).await;
        let first = people(1);
        let second = people(2);
        let third = people(3);

        let (a, b, c, ()) = tokio::join!(
            scheduler.schedule_all(&first),
            scheduler.schedule_all(&second),
            scheduler.schedule_all(&third),
            async { service.release_cancels() },
        );

        assert!(matches!(a.unwrap(), ScheduleOutcome::Completed(_)));
        assert_eq!(b.unwrap(), ScheduleOutcome::Superseded);
        let report = completed(c.unwrap());
        assert_eq!(report.scheduled.len(), 3);
        assert_eq!(service.cancel_count(), 2);
        assert_eq!(service.keys().len(), 3);
    }

    #[tokio::test]
    async fn request_permission_prompts_once_when_undetermined() {
        let service = MemoryNotificationService::new(SystemPermission::Undetermined);
        let scheduler =
            NotificationScheduler::new(Arc::new(service.clone()), clock(), ReminderPolicy::default());

        assert!(scheduler.request_permission().await.unwrap());
        assert_eq!(scheduler.permission(), PermissionState::Granted);
        assert!(scheduler.request_permission().await.unwrap());

        let prompts = service
            .calls()
            .into_iter()
            .filter(|c| *c == RegistryCall::RequestPermission)
            .count();
        assert_eq!(prompts, 1);
    }

    #[tokio::test]
    async fn denied_is_never_re_requested() {
        let service = MemoryNotificationService::new(SystemPermission::Undetermined);
        service.set_request_answer(SystemPermission::Denied);
        let scheduler =
            NotificationScheduler::new(Arc::new(service.clone()), clock(), ReminderPolicy::default());

        assert!(!scheduler.request_permission().await.unwrap());
        assert_eq!(scheduler.permission(), PermissionState::Denied);

        service.set_permission(SystemPermission::Granted);
        assert!(!scheduler.request_permission().await.unwrap());
        assert_eq!(scheduler.refresh_permission().await.unwrap(), PermissionState::Denied);
    }
}
