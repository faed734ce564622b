//! Viewer preference store contracts and implementations.
//!
//! # Responsibility
//! - Persist opaque string values under `(page_key, pref_key)`.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - Keys are non-blank after trim.
//! - `set` overwrites; `remove` of a missing key is not an error.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PrefResult<T> = Result<T, PrefError>;

/// Errors from preference store operations.
#[derive(Debug)]
pub enum PrefError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Page or preference key is blank.
    InvalidKey(String),
    /// Stored value could not be encoded or decoded.
    Serialization(serde_json::Error),
}

impl Display for PrefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "preference store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "preference store requires table `{table}`")
            }
            Self::InvalidKey(key) => write!(f, "preference key must not be blank: `{key}`"),
            Self::Serialization(err) => write!(f, "preference value encoding failed: {err}"),
        }
    }
}

impl Error for PrefError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidKey(_) => None,
        }
    }
}

impl From<DbError> for PrefError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PrefError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for PrefError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// String-keyed persistent map scoped by page identity.
pub trait PreferenceStore {
    /// Loads one value.
    fn get(&self, page_key: &str, pref_key: &str) -> PrefResult<Option<String>>;
    /// Stores one value, replacing any previous one.
    fn set(&self, page_key: &str, pref_key: &str, value: &str) -> PrefResult<()>;
    /// Removes one value.
    fn remove(&self, page_key: &str, pref_key: &str) -> PrefResult<()>;
}

fn validate_keys(page_key: &str, pref_key: &str) -> PrefResult<()> {
    for key in [page_key, pref_key] {
        if key.trim().is_empty() {
            return Err(PrefError::InvalidKey(key.to_string()));
        }
    }
    Ok(())
}

/// SQLite-backed preference store.
pub struct SqlitePreferenceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePreferenceStore<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PrefResult<Self> {
        ensure_preference_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PreferenceStore for SqlitePreferenceStore<'_> {
    fn get(&self, page_key: &str, pref_key: &str) -> PrefResult<Option<String>> {
        validate_keys(page_key, pref_key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM view_preferences WHERE page_key = ?1 AND pref_key = ?2;",
                params![page_key, pref_key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, page_key: &str, pref_key: &str, value: &str) -> PrefResult<()> {
        validate_keys(page_key, pref_key)?;
        self.conn.execute(
            "INSERT INTO view_preferences (page_key, pref_key, value, updated_at)
             VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000))
             ON CONFLICT(page_key, pref_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![page_key, pref_key, value],
        )?;
        debug!(
            "event=prefs_write module=repo status=ok page_key={} pref_key={} bytes={}",
            page_key,
            pref_key,
            value.len()
        );
        Ok(())
    }

    fn remove(&self, page_key: &str, pref_key: &str) -> PrefResult<()> {
        validate_keys(page_key, pref_key)?;
        self.conn.execute(
            "DELETE FROM view_preferences WHERE page_key = ?1 AND pref_key = ?2;",
            params![page_key, pref_key],
        )?;
        Ok(())
    }
}

fn ensure_preference_connection_ready(conn: &Connection) -> PrefResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(PrefError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'view_preferences'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(PrefError::MissingRequiredTable("view_preferences"));
    }
    Ok(())
}

/// Volatile store for tests and hosts without storage.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RefCell<BTreeMap<(String, String), String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, page_key: &str, pref_key: &str) -> PrefResult<Option<String>> {
        validate_keys(page_key, pref_key)?;
        Ok(self
            .values
            .borrow()
            .get(&(page_key.to_string(), pref_key.to_string()))
            .cloned())
    }

    fn set(&self, page_key: &str, pref_key: &str, value: &str) -> PrefResult<()> {
        validate_keys(page_key, pref_key)?;
        self.values.borrow_mut().insert(
            (page_key.to_string(), pref_key.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    fn remove(&self, page_key: &str, pref_key: &str) -> PrefResult<()> {
        validate_keys(page_key, pref_key)?;
        self.values
            .borrow_mut()
            .remove(&(page_key.to_string(), pref_key.to_string()));
        Ok(())
    }
}
