//! Local notification scheduling.
//!
//! The OS notification registry is treated as write-only: it can be wiped
//! and appended to, but never enumerated. [`NotificationScheduler`] keeps it
//! in sync by rebuilding it from scratch on every change.
//!
//! ## Permission states
//!
//! ```text
//! Unknown -> Checking -> (Granted | Denied | Undetermined)
//! Undetermined -> (Granted | Denied)    via request
//! Granted -> Checking                   re-query
//! Denied                                terminal for the session
//! ```

mod permission;
mod scheduler;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use permission::{PermissionState, PermissionTransitionError, SystemPermission};
pub use scheduler::{FailedNotification, NotificationScheduler, ScheduleOutcome, ScheduleReport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;
use crate::reminder::{CalendarRule, NotificationPayload};

/// One notification as held by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub key: String,
    pub rule: CalendarRule,
    pub payload: NotificationPayload,
}

/// The platform's local-notification facility.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Current permission without prompting.
    async fn permission_state(&self) -> Result<SystemPermission, NotificationError>;

    /// Prompt the user if the platform allows it.
    async fn request_permission(&self) -> Result<SystemPermission, NotificationError>;

    /// Remove every notification this app has scheduled.
    async fn cancel_all(&self) -> Result<(), NotificationError>;

    /// Register a notification. An existing entry with the same key is
    /// replaced.
    async fn schedule(
        &self,
        key: &str,
        rule: &CalendarRule,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError>;
}
