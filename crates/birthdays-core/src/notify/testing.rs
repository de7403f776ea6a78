//! In-memory notification registry for tests.
//!
//! Records every call in order, which makes it the test double for the
//! scheduler and migration paths. Failures and permission answers are
//! configurable per instance. Built for unit tests and, through the
//! `test-util` feature, for integration tests and downstream crates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{NotificationService, ScheduledEntry, SystemPermission};
use crate::error::NotificationError;
use crate::reminder::{CalendarRule, NotificationPayload};

const OPEN_GATE: usize = 1 << 20;

/// One call made against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    PermissionState,
    RequestPermission,
    CancelAll,
    Schedule(String),
}

#[derive(Debug)]
struct Inner {
    permission: SystemPermission,
    request_answer: SystemPermission,
    fail_cancel: bool,
    failing_keys: BTreeSet<String>,
    entries: BTreeMap<String, ScheduledEntry>,
    calls: Vec<RegistryCall>,
}

#[derive(Debug, Clone)]
pub struct MemoryNotificationService {
    inner: Arc<Mutex<Inner>>,
    cancel_gate: Arc<Semaphore>,
}

impl MemoryNotificationService {
    /// A registry that reports `permission` and answers prompts with
    /// `Granted`.
    pub fn new(permission: SystemPermission) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                permission,
                request_answer: SystemPermission::Granted,
                fail_cancel: false,
                failing_keys: BTreeSet::new(),
                entries: BTreeMap::new(),
                calls: Vec::new(),
            })),
            cancel_gate: Arc::new(Semaphore::new(OPEN_GATE)),
        }
    }

    pub fn granted() -> Self {
        Self::new(SystemPermission::Granted)
    }

    /// `cancel_all` blocks until [`release_cancels`](Self::release_cancels)
    /// is called.
    pub fn with_held_cancels(mut self) -> Self {
        self.cancel_gate = Arc::new(Semaphore::new(0));
        self
    }

    pub fn release_cancels(&self) {
        self.cancel_gate.add_permits(OPEN_GATE);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_permission(&self, permission: SystemPermission) {
        self.lock().permission = permission;
    }

    pub fn set_request_answer(&self, answer: SystemPermission) {
        self.lock().request_answer = answer;
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.lock().fail_cancel = fail;
    }

    pub fn fail_key(&self, key: &str) {
        self.lock().failing_keys.insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.failing_keys.clear();
        inner.fail_cancel = false;
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<ScheduledEntry> {
        self.lock().entries.values().cloned().collect()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RegistryCall::CancelAll))
            .count()
    }

    pub fn schedule_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RegistryCall::Schedule(_)))
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl NotificationService for MemoryNotificationService {
    async fn permission_state(&self) -> Result<SystemPermission, NotificationError> {
        let mut inner = self.lock();
        inner.calls.push(RegistryCall::PermissionState);
        Ok(inner.permission)
    }

    async fn request_permission(&self) -> Result<SystemPermission, NotificationError> {
        let mut inner = self.lock();
        inner.calls.push(RegistryCall::RequestPermission);
        if inner.permission == SystemPermission::Undetermined {
            inner.permission = inner.request_answer;
        }
        Ok(inner.permission)
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        let _permit = self
            .cancel_gate
            .acquire()
            .await
            .map_err(|e| NotificationError::CancelFailed(e.to_string()))?;
        let mut inner = self.lock();
        inner.calls.push(RegistryCall::CancelAll);
        if inner.fail_cancel {
            return Err(NotificationError::CancelFailed("registry unavailable".to_string()));
        }
        inner.entries.clear();
        Ok(())
    }

    async fn schedule(
        &self,
        key: &str,
        rule: &CalendarRule,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        let mut inner = self.lock();
        inner.calls.push(RegistryCall::Schedule(key.to_string()));
        if inner.failing_keys.contains(key) {
            return Err(NotificationError::ScheduleFailed {
                key: key.to_string(),
                message: "rejected by registry".to_string(),
            });
        }
        inner.entries.insert(
            key.to_string(),
            ScheduledEntry {
                key: key.to_string(),
                rule: *rule,
                payload: payload.clone(),
            },
        );
        Ok(())
    }
}
