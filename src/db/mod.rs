mod roster;
mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::FormatError;
use crate::identity::IdentityKey;
use crate::models::*;

pub use roster::Roster;

/// Failures reported by the roster store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student {0} is already registered as an individual")]
    DuplicateStudent(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("stored roster is unreadable: {0}")]
    Format(#[from] FormatError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence contract for the two collections the membership rules work on.
///
/// Every student lookup is an exact match on the [`IdentityKey`]. Group
/// capacity is derived by the store from the member count on every write.
pub trait RosterStore {
    fn find_group(&self, group_id: Uuid) -> StoreResult<Option<Group>>;
    fn find_group_by_member(&self, key: &IdentityKey) -> StoreResult<Option<Group>>;
    fn find_individual(&self, key: &IdentityKey) -> StoreResult<Option<Individual>>;
    fn find_individual_by_id(&self, individual_id: Uuid) -> StoreResult<Option<Individual>>;

    fn insert_group(&self, members: &[Member]) -> StoreResult<Group>;
    /// Fails with [`StoreError::DuplicateStudent`] if the student is already an individual.
    fn insert_individual(&self, name: &str, student_id: &str, email: &str)
        -> StoreResult<Individual>;
    /// Replace a group's roster. Fails with [`StoreError::NotFound`] if the group is gone.
    fn update_group_members(&self, group_id: Uuid, members: &[Member]) -> StoreResult<Group>;
    fn delete_group(&self, group_id: Uuid) -> StoreResult<bool>;
    fn delete_individual(&self, key: &IdentityKey) -> StoreResult<bool>;

    fn list_groups(&self) -> StoreResult<Vec<Group>>;
    fn list_individuals(&self) -> StoreResult<Vec<Individual>>;
    /// Groups whose `capacity_remaining` lies in `lo..=hi`.
    fn list_groups_with_capacity_between(&self, lo: u8, hi: u8) -> StoreResult<Vec<Group>>;

    /// Last known email of a grouped student, if one was captured.
    fn member_email(&self, key: &IdentityKey) -> StoreResult<Option<String>>;
    fn remember_member_email(&self, key: &IdentityKey, email: &str) -> StoreResult<()>;
}

/// Shared handle to the SQLite roster database.
///
/// Cloning is cheap; all clones serialize through the same connection.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        tracing::debug!(path = %path.display(), "opened roster database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Ensure both collections exist. Safe to call on every start.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Run `f` inside one exclusive write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls back
    /// every write `f` made. No other reader or writer on this handle runs
    /// while `f` executes.
    pub fn write<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Roster<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let value = f(&Roster::new(&tx))?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Run `f` against the latest committed state.
    pub fn read<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Roster<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self.conn.lock().expect("database lock poisoned");
        f(&Roster::new(&conn))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
