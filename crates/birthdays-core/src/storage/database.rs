//! SQLite-based record storage.
//!
//! Provides persistent storage for:
//! - Tracked people and groups
//! - The per-user reminder preference
//! - Key-value store for one-shot markers (migration flags, permission)
//! - The local notification registry and share snapshots

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::data_dir;
use super::migrations;
use crate::error::{DatabaseError, Result};
use crate::notify::ScheduledEntry;
use crate::person::{BirthdayRecord, Group};
use crate::preference::DaysBefore;
use crate::reminder::{CalendarRule, NotificationPayload};
use crate::store::{FlagStore, RecordStore, ReminderPreference};

const PERSON_COLUMNS: &str = "id, name, month, day, year, reminder_offsets, group_id";

/// SQLite database for people, preferences and local state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Lock the underlying SQLite connection.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the database at `~/.config/birthdays/birthdays.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("birthdays.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at a specific path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── People ───────────────────────────────────────────────────────

    fn row_to_person(row: &Row<'_>) -> rusqlite::Result<BirthdayRecord> {
        let offsets: String = row.get(5)?;
        let reminder_offsets: BTreeSet<u32> = serde_json::from_str(&offsets).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(BirthdayRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            month: row.get(2)?,
            day: row.get(3)?,
            year: row.get(4)?,
            reminder_offsets,
            group_id: row.get(6)?,
        })
    }

    /// Insert a new person owned by `user_id`.
    ///
    /// # Errors
    /// Returns an error if the record is invalid or the insert fails.
    pub fn insert_person(&self, user_id: &str, person: &BirthdayRecord) -> Result<()> {
        Self::insert_person_on(&self.conn(), user_id, person)
    }

    fn insert_person_on(conn: &Connection, user_id: &str, person: &BirthdayRecord) -> Result<()> {
        person.validate()?;
        let offsets = serde_json::to_string(&person.reminder_offsets)?;
        conn.execute(
            "INSERT INTO people (id, user_id, name, month, day, year, reminder_offsets, group_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                person.id,
                user_id,
                person.name,
                person.month,
                person.day,
                person.year,
                offsets,
                person.group_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_person(&self, user_id: &str, id: &str) -> Result<Option<BirthdayRecord>> {
        let conn = self.conn();
        let person = conn
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                Self::row_to_person,
            )
            .optional()?;
        Ok(person)
    }

    /// All people of `user_id`, in calendar order.
    pub fn people(&self, user_id: &str) -> Result<Vec<BirthdayRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE user_id = ?1 ORDER BY month, day, name"
        ))?;
        let rows = stmt.query_map(params![user_id], Self::row_to_person)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn people_in_group(&self, user_id: &str, group_id: &str) -> Result<Vec<BirthdayRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSON_COLUMNS} FROM people
             WHERE user_id = ?1 AND group_id = ?2
             ORDER BY month, day, name"
        ))?;
        let rows = stmt.query_map(params![user_id, group_id], Self::row_to_person)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a person. Returns whether a row was removed.
    pub fn delete_person(&self, user_id: &str, id: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "DELETE FROM people WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Put a person into a group, or take them out with `None`.
    ///
    /// # Errors
    /// Returns [`DatabaseError::NotFound`] for an unknown person or group.
    pub fn assign_group(
        &self,
        user_id: &str,
        person_id: &str,
        group_id: Option<&str>,
    ) -> Result<()> {
        if let Some(group_id) = group_id {
            if self.get_group(user_id, group_id)?.is_none() {
                return Err(DatabaseError::NotFound {
                    kind: "group",
                    id: group_id.to_string(),
                }
                .into());
            }
        }
        let changed = self.conn().execute(
            "UPDATE people SET group_id = ?2 WHERE id = ?1 AND user_id = ?3",
            params![person_id, group_id, user_id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                kind: "person",
                id: person_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // ── Groups ───────────────────────────────────────────────────────

    pub fn insert_group(&self, user_id: &str, group: &Group) -> Result<()> {
        self.conn().execute(
            "INSERT INTO groups (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![group.id, user_id, group.name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Insert a group together with its members, all or nothing.
    pub fn insert_group_with_members(
        &self,
        user_id: &str,
        group: &Group,
        members: &[BirthdayRecord],
    ) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO groups (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![group.id, user_id, group.name, Utc::now().to_rfc3339()],
        )?;
        for member in members {
            Self::insert_person_on(&tx, user_id, member)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_group(&self, user_id: &str, id: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        let group = conn
            .query_row(
                "SELECT id, name FROM groups WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| {
                    Ok(Group {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }

    pub fn groups(&self, user_id: &str) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name FROM groups WHERE user_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a group and detach its members. Returns whether it existed.
    pub fn delete_group(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "DELETE FROM groups WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed > 0 {
            tx.execute("UPDATE people SET group_id = NULL WHERE group_id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    // ── Preference ───────────────────────────────────────────────────

    pub fn preference(&self, user_id: &str) -> Result<Option<u32>> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT days_before FROM preferences WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_preference(&self, user_id: &str, days_before: DaysBefore) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO preferences (user_id, days_before, updated_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, days_before.days(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Notification registry ────────────────────────────────────────

    pub fn registry_clear(&self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM scheduled_notifications", [])?)
    }

    pub fn registry_upsert(
        &self,
        key: &str,
        rule: &CalendarRule,
        payload: &NotificationPayload,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO scheduled_notifications
                (key, month, day, hour, minute, repeats_yearly, title, body, scheduled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key,
                rule.month,
                rule.day,
                rule.hour,
                rule.minute,
                rule.repeats_yearly,
                payload.title,
                payload.body,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Registered notifications ordered by fire date.
    pub fn registry_entries(&self) -> Result<Vec<ScheduledEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, month, day, hour, minute, repeats_yearly, title, body
             FROM scheduled_notifications
             ORDER BY month, day, hour, minute, key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ScheduledEntry {
                key: row.get(0)?,
                rule: CalendarRule {
                    month: row.get(1)?,
                    day: row.get(2)?,
                    hour: row.get(3)?,
                    minute: row.get(4)?,
                    repeats_yearly: row.get(5)?,
                },
                payload: NotificationPayload {
                    title: row.get(6)?,
                    body: row.get(7)?,
                },
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Shares ───────────────────────────────────────────────────────

    pub fn insert_share(&self, code: &str, kind: &str, payload: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO shares (code, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![code, kind, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Stored `(kind, payload)` for a share code.
    pub fn get_share(&self, code: &str) -> Result<Option<(String, String)>> {
        let conn = self.conn();
        let share = conn
            .query_row(
                "SELECT kind, payload FROM shares WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(share)
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn get_preference(&self, user_id: &str) -> Result<Option<ReminderPreference>> {
        Ok(self
            .preference(user_id)?
            .map(|days_before| ReminderPreference { days_before }))
    }

    async fn set_preference(&self, user_id: &str, days_before: DaysBefore) -> Result<()> {
        Database::set_preference(self, user_id, days_before)
    }

    async fn list_people(&self, user_id: &str) -> Result<Vec<BirthdayRecord>> {
        self.people(user_id)
    }
}

#[async_trait]
impl FlagStore for Database {
    async fn get_flag(&self, key: &str) -> Result<Option<String>> {
        self.kv_get(key)
    }

    async fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value)
    }
}
