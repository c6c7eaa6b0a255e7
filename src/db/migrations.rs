use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
pub const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version = Self::get_version(conn).unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: users, tasks, reminders, settings
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('user','admin')),
            status TEXT NOT NULL CHECK(status IN ('active','inactive')),
            joined_ts INTEGER NOT NULL,
            last_login_ts INTEGER NULL
        )",
        [],
    )?;

    // user_id NULL = anonymous scope
    tx.execute(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            user_id INTEGER NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            notes TEXT NULL,
            priority TEXT NOT NULL CHECK(priority IN ('UI','UNI','NUI','NUNI')),
            due_ts INTEGER NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_ts INTEGER NULL,
            origin TEXT NOT NULL DEFAULT 'manual'
                CHECK(origin IN ('manual','ics','gcal','apple')),
            source_event_id TEXT NULL,
            rollover_count INTEGER NOT NULL DEFAULT 0,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute("CREATE INDEX idx_tasks_user_id ON tasks(user_id)", [])?;
    tx.execute("CREATE INDEX idx_tasks_due_ts ON tasks(due_ts)", [])?;

    tx.execute(
        "CREATE TABLE reminders (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            user_id INTEGER NULL REFERENCES users(id) ON DELETE CASCADE,
            task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            remind_ts INTEGER NOT NULL,
            email TEXT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute("CREATE INDEX idx_reminders_task_id ON reminders(task_id)", [])?;
    tx.execute("CREATE INDEX idx_reminders_remind_ts ON reminders(remind_ts)", [])?;

    tx.execute(
        "CREATE TABLE settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Migration v2: task categories and imported-event lookup
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "ALTER TABLE tasks ADD COLUMN task_type TEXT NOT NULL DEFAULT 'work'
            CHECK(task_type IN ('work','personal','health','learning','family','other'))",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_tasks_source_event_id ON tasks(user_id, source_event_id)",
        [],
    )?;
    Ok(())
}
