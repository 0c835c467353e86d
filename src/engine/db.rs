//! SQLite store: opening, schema migration, and first-run bootstrap.

use rusqlite::Connection;
use std::fs;
use tracing::debug;

use super::config::Config;
use super::error::{Result, TrackerError};

pub struct Db;

impl Db {
    /// Creates the data directory and database, then applies the schema.
    ///
    /// # Errors
    /// Returns error if directory creation, DB opening, or migration fails.
    pub fn init(config: &Config) -> Result<Connection> {
        let dir = config.data_dir();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(config.db_path())?;
        Self::migrate(&conn)?;
        debug!(path = %config.db_path().display(), "database initialized");
        Ok(conn)
    }

    /// Connects to an existing database.
    ///
    /// # Errors
    /// Returns `NotInitialized` if the database file does not exist.
    pub fn connect(config: &Config) -> Result<Connection> {
        let db_path = config.db_path();
        if !db_path.exists() {
            return Err(TrackerError::NotInitialized);
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Opens a migrated in-memory database.
    ///
    /// # Errors
    /// Returns error if migration fails.
    pub fn open_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(conn)
    }

    /// Applies the schema migrations.
    fn migrate(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                UNIQUE (name, role)
            );

            CREATE TABLE IF NOT EXISTS project_types (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS platforms (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_groups (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                sap INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                position_id INTEGER REFERENCES positions(id)
            );

            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                assigned_to INTEGER NOT NULL REFERENCES users(sap),
                type_id INTEGER NOT NULL REFERENCES project_types(id),
                level TEXT NOT NULL,
                request_date TEXT NOT NULL,
                plan_start_date TEXT NOT NULL,
                plan_end_date TEXT NOT NULL,
                actual_start TEXT,
                actual_end TEXT,
                live_date TEXT,
                remark TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL REFERENCES projects(id),
                assigned_to INTEGER NOT NULL REFERENCES users(sap),
                task_group_id INTEGER NOT NULL REFERENCES task_groups(id),
                platform_id INTEGER NOT NULL REFERENCES platforms(id),
                detail TEXT NOT NULL,
                plan_start_date TEXT NOT NULL,
                plan_end_date TEXT NOT NULL,
                actual_start TEXT,
                actual_end TEXT,
                progress INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS update_history (
                id INTEGER PRIMARY KEY,
                entity TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                before_value TEXT,
                after_value TEXT,
                changed_by TEXT NOT NULL,
                changed_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_history_entity ON update_history(entity, entity_id);",
        )?;
        Ok(())
    }
}
