//! Share code commands for CLI.

use birthdays_core::{redeem, share_group, share_person};
use clap::Subcommand;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum ShareAction {
    /// Create a code for one person
    Person {
        /// Person id
        id: String,
    },
    /// Create a code for a group and its members
    Group {
        /// Group id
        id: String,
    },
    /// Import the people behind a code
    Redeem {
        /// Share code
        code: String,
    },
}

pub async fn run(action: ShareAction) -> CliResult {
    let session = Session::open()?;

    match action {
        ShareAction::Person { id } => {
            let code = share_person(&session.db, session.user_id(), &id)?;
            println!("{code}");
        }
        ShareAction::Group { id } => {
            let code = share_group(&session.db, session.user_id(), &id)?;
            println!("{code}");
        }
        ShareAction::Redeem { code } => {
            let redeemed = redeem(&session.db, session.user_id(), &code)?;
            session.sync().await?;
            print_json(&redeemed)?;
        }
    }
    Ok(())
}
