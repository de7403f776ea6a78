//! Subcommand implementations.

pub mod config;
pub mod group;
pub mod notify;
pub mod person;
pub mod reminder;
pub mod share;

use std::error::Error;
use std::sync::Arc;

use birthdays_core::{
    Config, Database, LocalNotificationRegistry, ReminderCoordinator, ScheduleOutcome,
    SystemClock,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Everything a command needs: config, database, and the coordinator
/// wired to the local registry.
pub struct Session {
    pub config: Config,
    pub db: Arc<Database>,
    pub registry: Arc<LocalNotificationRegistry>,
    pub coordinator: ReminderCoordinator,
}

impl Session {
    pub fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        let registry = Arc::new(LocalNotificationRegistry::new(
            db.clone(),
            config.notifications.enabled,
        ));
        let coordinator = ReminderCoordinator::new(
            db.clone(),
            db.clone(),
            registry.clone(),
            Arc::new(SystemClock),
            config.reminder_policy()?,
            config.user_id.clone(),
        );
        Ok(Self {
            config,
            db,
            registry,
            coordinator,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Start the session and rebuild the registry after a data change.
    pub async fn sync(&self) -> CliResult<ScheduleOutcome> {
        let start = self.coordinator.start().await?;
        tracing::debug!(permission = ?start.permission, migration = ?start.migration, "session started");
        let outcome = self.coordinator.people_changed().await?;
        if let ScheduleOutcome::Completed(report) = &outcome {
            for failed in &report.failed {
                eprintln!("warning: could not schedule {}: {}", failed.key, failed.message);
            }
        }
        Ok(outcome)
    }
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
