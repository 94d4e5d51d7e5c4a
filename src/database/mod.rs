//! # Database
//!
//! SQLite persistence for accounts, pending registrations and task lists.
//! One connection sits behind an async mutex; every statement runs
//! synchronously while the lock is held, so no prepared statement ever lives
//! across an await point.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Confirmation promotion runs in a single transaction
//! - 1.1.0: Task list table with contiguous positions
//! - 1.0.0: Initial schema (users, unverified_users)

mod accounts;
mod registrations;
pub mod store;
mod tasks;

pub use store::{
    Account, AccountStore, PendingRegistration, PendingRegistrationStore, RedeemError, StoreError,
    TaskListItem, TaskStore,
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Timestamp layout used in every `created_at` column. Sorts lexicographically.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Primary result code for constraint violations (UNIQUE, FOREIGN KEY, ...).
const SQLITE_CONSTRAINT: isize = 19;

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        subscribed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS unverified_users (
        email TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_email ON tasks(email, position);

    CREATE INDEX IF NOT EXISTS idx_users_subscribed ON users(subscribed);
";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let conn = sqlite::open(path)?;
        conn.execute(SCHEMA)?;
        info!("Database ready at {path}");
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fresh private database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:").await
    }
}

fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn is_constraint_violation(err: &sqlite::Error) -> bool {
    // Extended codes keep the primary code in the low byte
    err.code.is_some_and(|code| code & 0xff == SQLITE_CONSTRAINT)
}

/// New opaque confirmation token.
fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Run `body` inside `BEGIN IMMEDIATE` / `COMMIT`, rolling back on any error.
fn transaction<T, E, F>(conn: &Connection, body: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    conn.execute("BEGIN IMMEDIATE")
        .map_err(|e| E::from(StoreError::from(e)))?;

    match body(conn) {
        Ok(value) => match conn.execute("COMMIT") {
            Ok(()) => Ok(value),
            Err(e) => {
                rollback(conn);
                Err(E::from(StoreError::from(e)))
            }
        },
        Err(e) => {
            rollback(conn);
            Err(e)
        }
    }
}

fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute("ROLLBACK") {
        warn!("Failed to roll back transaction: {e}");
    }
}
