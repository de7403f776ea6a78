use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "birthdays-cli", version, about = "Birthdays CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// People and their birthdays
    Person {
        #[command(subcommand)]
        action: commands::person::PersonAction,
    },
    /// Group management
    Group {
        #[command(subcommand)]
        action: commands::group::GroupAction,
    },
    /// Advance reminder preference
    Reminder {
        #[command(subcommand)]
        action: commands::reminder::ReminderAction,
    },
    /// Notification permission and registry
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Share codes
    Share {
        #[command(subcommand)]
        action: commands::share::ShareAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Person { action } => commands::person::run(action).await,
        Commands::Group { action } => commands::group::run(action).await,
        Commands::Reminder { action } => commands::reminder::run(action).await,
        Commands::Notify { action } => commands::notify::run(action).await,
        Commands::Share { action } => commands::share::run(action).await,
        Commands::Config { action } => commands::config::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
