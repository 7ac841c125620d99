//! Database module for quickcap
//!
//! One SQLite connection behind a mutex. Queries for each area live in the
//! submodules as further `impl Database` blocks.

use anyhow::{Context, Result};
use rusqlite::Connection;
use rusqlite::types::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

mod admin;
mod pomodoro;
mod records;
mod reminders;
mod resources;
mod thinking;

pub use admin::TableCounts;
pub use resources::Owner;

/// Thread-safe database wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        // The CLI companion and the server may share the file
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, path = %path.display(), "Database opened");

        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;

        Ok(db)
    }

    /// A poisoned lock only means another handler panicked mid-request;
    /// SQLite itself is still consistent.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            -- Tasks and quick captures
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY,
                content TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                parent_id INTEGER REFERENCES records(id),
                user_id INTEGER,
                priority TEXT NOT NULL DEFAULT 'medium',
                progress INTEGER NOT NULL DEFAULT 0,
                progress_notes TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                task_type TEXT NOT NULL DEFAULT 'work',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Reference library
            CREATE TABLE IF NOT EXISTS info_resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                resource_type TEXT NOT NULL DEFAULT 'general',
                user_id INTEGER,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Pomodoro focus tasks
            CREATE TABLE IF NOT EXISTS pomodoro_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                related_task_ids TEXT NOT NULL DEFAULT '[]',
                priority_score INTEGER NOT NULL DEFAULT 0,
                estimated_pomodoros INTEGER NOT NULL DEFAULT 1,
                order_index INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                started_at TEXT,
                completed_at TEXT,
                pomodoros_completed INTEGER NOT NULL DEFAULT 0,
                total_focus_time INTEGER NOT NULL DEFAULT 0,
                generation_context TEXT,
                ai_reasoning TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Recurring reminders, guest-owned when user_id is NULL
            CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                content TEXT NOT NULL,
                frequency TEXT NOT NULL DEFAULT 'daily',
                day_of_week INTEGER,
                remind_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                last_triggered_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Structured thinking sessions
            CREATE TABLE IF NOT EXISTS thinking_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                template_id TEXT NOT NULL,
                template_name TEXT NOT NULL,
                title TEXT NOT NULL,
                questions TEXT NOT NULL DEFAULT '[]',
                answers TEXT NOT NULL DEFAULT '{}',
                is_completed INTEGER NOT NULL DEFAULT 0,
                total_time_spent INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                insights TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_records_user ON records(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent_id);
            CREATE INDEX IF NOT EXISTS idx_records_created ON records(created_at);
            CREATE INDEX IF NOT EXISTS idx_resources_user ON info_resources(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_pomodoro_user ON pomodoro_tasks(user_id, order_index);
            CREATE INDEX IF NOT EXISTS idx_thinking_user ON thinking_records(user_id);

            -- At most one active pomodoro task per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_pomodoro_one_active
                ON pomodoro_tasks(user_id) WHERE status = 'active';
            "#,
        )?;

        Ok(())
    }
}

/// WHERE-clause builder for listing queries with optional filters
#[derive(Default)]
struct Filter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    /// Add a clause whose `?` placeholders are bound to `values` in order
    fn push(&mut self, clause: &str, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.to_string());
        self.params.extend(values);
    }

    fn push_clause(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// `%term%` pattern for LIKE with the wildcard characters escaped
fn like_pattern(term: &str) -> Value {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Value::Text(format!("%{escaped}%"))
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_initializes_twice() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("quickcap.sqlite");
        let _db = Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn filter_joins_clauses() {
        let mut filter = Filter::default();
        assert_eq!(filter.sql(), "");
        filter.push("user_id = ?", [Value::Integer(1)]);
        filter.push("status != ?", [text("deleted")]);
        assert_eq!(filter.sql(), "WHERE user_id = ? AND status != ?");
        assert_eq!(filter.params.len(), 2);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), Value::Text("%50\\%\\_off%".to_string()));
    }
}
