//! Group management commands for CLI.

use birthdays_core::Group;
use clap::Subcommand;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a group
    Create {
        /// Group name
        name: String,
    },
    /// List all groups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a group (members are kept, ungrouped)
    Remove {
        /// Group id
        id: String,
    },
    /// Put a person into a group, or take them out with --none
    Assign {
        /// Person id
        person: String,
        /// Group id
        #[arg(required_unless_present = "none")]
        group: Option<String>,
        /// Remove the person from their group
        #[arg(long, conflicts_with = "group")]
        none: bool,
    },
}

pub async fn run(action: GroupAction) -> CliResult {
    let session = Session::open()?;

    match action {
        GroupAction::Create { name } => {
            let group = Group::new(&name)?;
            session.db.insert_group(session.user_id(), &group)?;
            println!("Group created: {}", group.id);
            print_json(&group)?;
        }
        GroupAction::List { json } => {
            let groups = session.db.groups(session.user_id())?;
            if json {
                print_json(&groups)?;
            } else {
                for group in &groups {
                    let members = session.db.people_in_group(session.user_id(), &group.id)?;
                    println!("{}  {} ({} people)", group.id, group.name, members.len());
                }
            }
        }
        GroupAction::Remove { id } => {
            if !session.db.delete_group(session.user_id(), &id)? {
                return Err(format!("group not found: {id}").into());
            }
            println!("Group removed: {id}");
        }
        GroupAction::Assign {
            person,
            group,
            none,
        } => {
            let target = if none { None } else { group.as_deref() };
            session.db.assign_group(session.user_id(), &person, target)?;
            match target {
                Some(group_id) => println!("Assigned {person} to {group_id}"),
                None => println!("Removed {person} from its group"),
            }
        }
    }
    Ok(())
}
