//! Share codes for handing people or whole groups to another user.
//!
//! Sharing snapshots the data as JSON under a short code. Redeeming a code
//! imports the snapshot as new records with fresh ids, so redeeming twice
//! yields duplicates rather than overwriting anything.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result, ValidationError};
use crate::person::{BirthdayRecord, Group};
use crate::storage::Database;

/// No 0/O or 1/I, so codes survive being read aloud.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareCode(String);

impl ShareCode {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize user input. Case and surrounding whitespace are ignored.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b));
        if !valid {
            return Err(ValidationError::UnknownShareCode(input.trim().to_string()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SharePayload {
    Person {
        person: BirthdayRecord,
    },
    Group {
        group: Group,
        members: Vec<BirthdayRecord>,
    },
}

impl SharePayload {
    fn kind(&self) -> &'static str {
        match self {
            SharePayload::Person { .. } => "person",
            SharePayload::Group { .. } => "group",
        }
    }
}

/// What a redeemed code added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redeemed {
    pub group: Option<Group>,
    pub people: Vec<BirthdayRecord>,
}

fn store(db: &Database, payload: &SharePayload) -> Result<ShareCode> {
    let json = serde_json::to_string(payload)?;
    for _ in 0..MAX_ATTEMPTS {
        let code = ShareCode::generate();
        if db.get_share(code.as_str())?.is_none() {
            db.insert_share(code.as_str(), payload.kind(), &json)?;
            tracing::info!(code = %code, kind = payload.kind(), "created share code");
            return Ok(code);
        }
    }
    Err(DatabaseError::QueryFailed("could not allocate a unique share code".to_string()).into())
}

/// Share one of `user_id`'s people.
pub fn share_person(db: &Database, user_id: &str, person_id: &str) -> Result<ShareCode> {
    let person = db.get_person(user_id, person_id)?.ok_or_else(|| DatabaseError::NotFound {
        kind: "person",
        id: person_id.to_string(),
    })?;
    store(db, &SharePayload::Person { person })
}

/// Share a group with all of its members.
pub fn share_group(db: &Database, user_id: &str, group_id: &str) -> Result<ShareCode> {
    let group = db.get_group(user_id, group_id)?.ok_or_else(|| DatabaseError::NotFound {
        kind: "group",
        id: group_id.to_string(),
    })?;
    let members = db.people_in_group(user_id, group_id)?;
    store(db, &SharePayload::Group { group, members })
}

fn fresh_copy(person: &BirthdayRecord, group_id: Option<&str>) -> BirthdayRecord {
    BirthdayRecord {
        id: uuid::Uuid::new_v4().to_string(),
        group_id: group_id.map(str::to_string),
        ..person.clone()
    }
}

/// Import the snapshot behind `code` for `user_id`.
///
/// # Errors
/// Returns [`ValidationError::UnknownShareCode`] for malformed or unknown
/// codes.
pub fn redeem(db: &Database, user_id: &str, code: &str) -> Result<Redeemed> {
    let code = ShareCode::parse(code)?;
    let (_, json) = db
        .get_share(code.as_str())?
        .ok_or_else(|| ValidationError::UnknownShareCode(code.to_string()))?;
    let payload: SharePayload = serde_json::from_str(&json)?;

    let redeemed = match payload {
        SharePayload::Person { person } => {
            let copy = fresh_copy(&person, None);
            db.insert_person(user_id, &copy)?;
            Redeemed {
                group: None,
                people: vec![copy],
            }
        }
        SharePayload::Group { group, members } => {
            let new_group = Group {
                id: uuid::Uuid::new_v4().to_string(),
                name: group.name,
            };
            let people: Vec<_> = members
                .iter()
                .map(|member| fresh_copy(member, Some(&new_group.id)))
                .collect();
            db.insert_group_with_members(user_id, &new_group, &people)?;
            Redeemed {
                group: Some(new_group),
                people,
            }
        }
    };

    tracing::info!(code = %code, people = redeemed.people.len(), "redeemed share code");
    Ok(redeemed)
}
