//! Database schema migrations for birthdays.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: people, per-user preference, and the kv flag table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS people (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            name             TEXT NOT NULL,
            month            INTEGER NOT NULL,
            day              INTEGER NOT NULL,
            year             INTEGER,
            reminder_offsets TEXT NOT NULL DEFAULT '[]',
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS preferences (
            user_id     TEXT PRIMARY KEY,
            days_before INTEGER NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_people_user ON people(user_id);
        CREATE INDEX IF NOT EXISTS idx_people_month_day ON people(month, day);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: groups.
///
/// Adds the `groups` table and a nullable `group_id` column on people.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS groups (
            id         TEXT PRIMARY KEY,
            user_id    TEXT NOT NULL,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        ALTER TABLE people ADD COLUMN group_id TEXT;

        CREATE INDEX IF NOT EXISTS idx_people_group ON people(group_id);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: local notification registry and share snapshots.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS scheduled_notifications (
            key            TEXT PRIMARY KEY,
            month          INTEGER NOT NULL,
            day            INTEGER NOT NULL,
            hour           INTEGER NOT NULL,
            minute         INTEGER NOT NULL,
            repeats_yearly INTEGER NOT NULL,
            title          TEXT NOT NULL,
            body           TEXT NOT NULL,
            scheduled_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shares (
            code       TEXT PRIMARY KEY,
            kind       TEXT NOT NULL,
            payload    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()
}
