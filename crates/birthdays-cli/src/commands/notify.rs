//! Notification permission and registry commands for CLI.

use clap::Subcommand;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Show permission, preference and migration state
    Status,
    /// Ask for notification permission and schedule if granted
    Request,
    /// Forget a previous grant
    Revoke,
    /// Wipe and rebuild the notification registry
    Rebuild,
    /// List registered notifications
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: NotifyAction) -> CliResult {
    let session = Session::open()?;

    match action {
        NotifyAction::Status => {
            let report = session.coordinator.start().await?;
            let registered = session.db.registry_entries()?.len();
            print_json(&serde_json::json!({
                "enabled": session.config.notifications.enabled,
                "permission": report.permission,
                "days_before": report.days_before,
                "people": report.people,
                "migration": report.migration,
                "registered": registered,
            }))?;
        }
        NotifyAction::Request => {
            session.coordinator.start().await?;
            if session.coordinator.request_permission().await? {
                println!("Notifications granted");
            } else {
                println!("Notifications not granted");
            }
        }
        NotifyAction::Revoke => {
            session.registry.reset_permission()?;
            session.sync().await?;
            println!("Permission reset; registry cleared");
        }
        NotifyAction::Rebuild => {
            let outcome = session.sync().await?;
            print_json(&outcome)?;
        }
        NotifyAction::List { json } => {
            let entries = session.db.registry_entries()?;
            if json {
                print_json(&entries)?;
            } else {
                for entry in &entries {
                    println!(
                        "{:02}-{:02} {:02}:{:02}  {:<48} {}",
                        entry.rule.month,
                        entry.rule.day,
                        entry.rule.hour,
                        entry.rule.minute,
                        entry.key,
                        entry.payload.title
                    );
                }
            }
        }
    }
    Ok(())
}
