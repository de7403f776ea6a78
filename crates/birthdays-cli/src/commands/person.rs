//! Person management commands for CLI.

use birthdays_core::person::offsets_from_signed;
use birthdays_core::{format_date, upcoming, BirthdayRecord, Clock, SystemClock};
use clap::Subcommand;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum PersonAction {
    /// Add a person
    Add {
        /// Display name
        name: String,
        /// Birthday as MM-DD (e.g. "02-29")
        date: String,
        /// Birth year, if known
        #[arg(long)]
        year: Option<i32>,
        /// Extra reminder offset in days (repeatable)
        #[arg(long = "remind", allow_negative_numbers = true)]
        remind: Vec<i64>,
        /// Group id
        #[arg(long)]
        group: Option<String>,
    },
    /// List all people
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one person
    Show {
        /// Person id
        id: String,
    },
    /// Remove a person
    Remove {
        /// Person id
        id: String,
    },
    /// Birthdays ordered by how soon they occur
    Upcoming {
        /// Only show birthdays within this many days
        #[arg(long)]
        within: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse "MM-DD" (or "M-D") into month and day.
fn parse_month_day(input: &str) -> Result<(u32, u32), String> {
    let (month, day) = input
        .trim()
        .split_once(['-', '/'])
        .ok_or_else(|| format!("expected MM-DD, got '{input}'"))?;
    let month = month
        .parse()
        .map_err(|_| format!("invalid month in '{input}'"))?;
    let day = day.parse().map_err(|_| format!("invalid day in '{input}'"))?;
    Ok((month, day))
}

pub async fn run(action: PersonAction) -> CliResult {
    let session = Session::open()?;

    match action {
        PersonAction::Add {
            name,
            date,
            year,
            remind,
            group,
        } => {
            let (month, day) = parse_month_day(&date)?;
            let mut person =
                BirthdayRecord::new(&name, month, day)?.with_offsets(offsets_from_signed(remind)?);
            person.year = year;
            if let Some(group_id) = group {
                if session.db.get_group(session.user_id(), &group_id)?.is_none() {
                    return Err(format!("group not found: {group_id}").into());
                }
                person = person.with_group(group_id);
            }
            session.db.insert_person(session.user_id(), &person)?;
            session.sync().await?;
            println!("Person added: {}", person.id);
            print_json(&person)?;
        }
        PersonAction::List { json } => {
            let people = session.db.people(session.user_id())?;
            if json {
                print_json(&people)?;
            } else if people.is_empty() {
                println!("No people yet.");
            } else {
                for person in &people {
                    println!(
                        "{}  {:<24} {}",
                        person.id,
                        person.name,
                        format_date(person.month, person.day, person.year)
                    );
                }
            }
        }
        PersonAction::Show { id } => {
            let person = session
                .db
                .get_person(session.user_id(), &id)?
                .ok_or_else(|| format!("person not found: {id}"))?;
            let row = upcoming(std::slice::from_ref(&person), SystemClock.today(), None)
                .into_iter()
                .next();
            print_json(&serde_json::json!({
                "person": person,
                "birthday": format_date(person.month, person.day, person.year),
                "next": row.as_ref().map(|r| r.next),
                "days_until": row.as_ref().map(|r| r.days_until),
                "turning": row.as_ref().and_then(|r| r.turning),
            }))?;
        }
        PersonAction::Remove { id } => {
            if !session.db.delete_person(session.user_id(), &id)? {
                return Err(format!("person not found: {id}").into());
            }
            session.sync().await?;
            println!("Person removed: {id}");
        }
        PersonAction::Upcoming { within, json } => {
            let people = session.db.people(session.user_id())?;
            let rows = upcoming(&people, SystemClock.today(), within);
            if json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    let when = match row.days_until {
                        0 => "today".to_string(),
                        1 => "tomorrow".to_string(),
                        n => format!("in {n} days"),
                    };
                    let turning = row
                        .turning
                        .map(|age| format!(" (turning {age})"))
                        .unwrap_or_default();
                    println!("{:<24} {} {when}{turning}", row.person.name, row.next);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_day() {
        assert_eq!(parse_month_day("02-29").unwrap(), (2, 29));
        assert_eq!(parse_month_day("12/5").unwrap(), (12, 5));
        assert!(parse_month_day("1229").is_err());
        assert!(parse_month_day("xx-01").is_err());
    }
}
