//! SQLite-backed notification registry for headless use.
//!
//! Stands in for the OS notification center when running from the CLI:
//! scheduled entries land in the `scheduled_notifications` table, where a
//! cron job or desktop shell can pick them up. Permission follows
//! `notifications.enabled` in the config, and a granted prompt is
//! remembered in the kv table.

use std::sync::Arc;

use async_trait::async_trait;

use super::Database;
use crate::error::NotificationError;
use crate::notify::{NotificationService, SystemPermission};
use crate::reminder::{CalendarRule, NotificationPayload};

const PERMISSION_KEY: &str = "notification_permission";

pub struct LocalNotificationRegistry {
    db: Arc<Database>,
    enabled: bool,
}

impl LocalNotificationRegistry {
    pub fn new(db: Arc<Database>, enabled: bool) -> Self {
        Self { db, enabled }
    }

    /// Forget a previous grant so the next request prompts again.
    pub fn reset_permission(&self) -> crate::error::Result<()> {
        self.db.kv_delete(PERMISSION_KEY)
    }
}

#[async_trait]
impl NotificationService for LocalNotificationRegistry {
    async fn permission_state(&self) -> Result<SystemPermission, NotificationError> {
        if !self.enabled {
            return Ok(SystemPermission::Denied);
        }
        let stored = self
            .db
            .kv_get(PERMISSION_KEY)
            .map_err(|e| NotificationError::PermissionQueryFailed(e.to_string()))?;
        Ok(match stored.as_deref() {
            Some("granted") => SystemPermission::Granted,
            _ => SystemPermission::Undetermined,
        })
    }

    async fn request_permission(&self) -> Result<SystemPermission, NotificationError> {
        if !self.enabled {
            return Ok(SystemPermission::Denied);
        }
        self.db
            .kv_set(PERMISSION_KEY, "granted")
            .map_err(|e| NotificationError::PermissionQueryFailed(e.to_string()))?;
        Ok(SystemPermission::Granted)
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        let removed = self
            .db
            .registry_clear()
            .map_err(|e| NotificationError::CancelFailed(e.to_string()))?;
        tracing::debug!(removed, "cleared local notification registry");
        Ok(())
    }

    async fn schedule(
        &self,
        key: &str,
        rule: &CalendarRule,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.db
            .registry_upsert(key, rule, payload)
            .map_err(|e| NotificationError::ScheduleFailed {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}
