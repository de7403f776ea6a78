//! # Birthdays Core Library
//!
//! This library provides the core logic for the Birthdays reminder app:
//! recurring-date arithmetic and the local notification pipeline built on
//! top of it. Every front end (CLI, desktop shell, mobile bridge) is a thin
//! layer over the same core.
//!
//! ## Architecture
//!
//! - **Dates**: next occurrence, days until, and age turning for a recurring
//!   month/day, including the February 29 case
//! - **Reminders**: the notifications each person should have
//! - **Notify**: wipe-and-rebuild synchronization with the platform's
//!   notification registry, serialized and permission-gated
//! - **Migration**: one forced rebuild per installation per notification
//!   shape version
//! - **Storage**: SQLite records and TOML configuration
//!
//! ## Key Components
//!
//! - [`NotificationScheduler`]: registry rebuild and permission state machine
//! - [`ReminderCoordinator`]: session owner that triggers rebuilds
//! - [`Database`]: people, groups, preference and flag persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod coordinator;
pub mod dates;
pub mod error;
pub mod migration;
pub mod notify;
pub mod person;
pub mod preference;
pub mod reminder;
pub mod share;
pub mod storage;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::{ReminderCoordinator, StartReport};
pub use dates::{age_on_next_occurrence, days_until, format_date, is_today, next_occurrence, MonthDay};
pub use error::{ConfigError, CoreError, DatabaseError, NotificationError, ValidationError};
pub use migration::{MigrationGuard, MigrationOutcome, NotificationMigration};
pub use notify::{
    NotificationScheduler, NotificationService, PermissionState, ScheduleOutcome, ScheduleReport,
    ScheduledEntry, SystemPermission,
};
pub use person::{upcoming, BirthdayRecord, Group, Upcoming};
pub use preference::{DaysBefore, PreferenceStore};
pub use reminder::{CalendarRule, DesiredNotification, NotificationPayload, ReminderMode, ReminderPolicy};
pub use share::{redeem, share_group, share_person, ShareCode};
pub use storage::{Config, Database, LocalNotificationRegistry};
pub use store::{FlagStore, RecordStore, ReminderPreference};
