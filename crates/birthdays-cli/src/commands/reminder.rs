//! Advance reminder preference commands for CLI.

use birthdays_core::{DaysBefore, PreferenceStore, ScheduleOutcome};
use clap::Subcommand;

use super::{CliResult, Session};

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Show the current days-before preference
    Get,
    /// Set days-before (0, 1, 3 or 7) and reschedule
    Set {
        /// Days before the birthday
        days: DaysBefore,
    },
}

pub async fn run(action: ReminderAction) -> CliResult {
    let session = Session::open()?;

    match action {
        ReminderAction::Get => {
            let preferences = PreferenceStore::new(session.db.clone(), session.user_id());
            println!("{}", preferences.load().await);
        }
        ReminderAction::Set { days } => {
            session.coordinator.start().await?;
            match session.coordinator.set_days_before(days).await? {
                ScheduleOutcome::Completed(report) => println!(
                    "days_before = {days} ({} notifications scheduled)",
                    report.scheduled.len()
                ),
                ScheduleOutcome::Superseded => println!("days_before = {days}"),
            }
        }
    }
    Ok(())
}
