//! Storage adapter over a single `rusqlite` connection.
//!
//! The connection is opened lazily on first use. Writes commit immediately
//! unless the caller opts out, in which case they run inside a transaction
//! that stays open until [`Database::commit`].

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Open the file read-only instead of read-write-create
    #[serde(default)]
    pub read_only: bool,
    /// How long to wait on a locked database before failing
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            read_only: false,
            busy_timeout_ms: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_busy_timeout(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = Some(millis);
        self
    }

    fn open(&self) -> Result<Connection> {
        let flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        let connection = Connection::open_with_flags(&self.db_path, flags)?;
        if let Some(millis) = self.busy_timeout_ms {
            connection.busy_timeout(Duration::from_millis(millis))?;
        }
        Ok(connection)
    }
}

enum State {
    Idle,
    Open(Connection),
    Closed,
}

/// Owns one connection. Not `Sync`: share it across threads only behind
/// an external lock.
pub struct Database {
    config: DatabaseConfig,
    state: RefCell<State>,
}

impl Database {
    /// Creates the adapter without touching the file yet.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            state: RefCell::new(State::Idle),
        }
    }

    pub fn open(db_path: impl Into<String>) -> Result<Self> {
        let database = Self::new(DatabaseConfig::new(db_path));
        database.connect()?;
        Ok(database)
    }

    pub fn open_in_memory() -> Result<Self> {
        let database = Self::new(DatabaseConfig::in_memory());
        database.connect()?;
        Ok(database)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Opens the connection. Calling it while connected does nothing; calling
    /// it after [`close`](Self::close) reopens.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, State::Open(_)) {
            *state = State::Open(self.config.open()?);
            info!(path = %self.config.db_path, "database connected");
        }
        Ok(())
    }

    /// Releases the connection. Uncommitted work is rolled back.
    pub fn close(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), State::Closed);
        if let State::Open(connection) = previous {
            connection.close().map_err(|(_, err)| err)?;
            info!(path = %self.config.db_path, "database disconnected");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), State::Open(_))
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if matches!(*self.state.borrow(), State::Idle) {
            self.connect()?;
        }
        match &*self.state.borrow() {
            State::Open(connection) => f(connection),
            State::Idle | State::Closed => Err(Error::NotConnected),
        }
    }

    /// Runs a query and returns at most `limit` rows when one is given.
    pub fn select(&self, sql: &str, params: &[Value], limit: Option<usize>) -> Result<Vec<Record>> {
        let rows = self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(params_from_iter(params))?;

            let mut result = Vec::new();
            while limit.map_or(true, |limit| result.len() < limit) {
                let Some(row) = rows.next()? else {
                    break;
                };
                let mut record = Record::with_capacity(names.len());
                for (idx, name) in names.iter().enumerate() {
                    record.set(name.as_str(), row.get::<_, Value>(idx)?);
                }
                result.push(record);
            }
            Ok(result)
        })?;
        info!(rows_selected = rows.len(), "rows selected");
        Ok(rows)
    }

    /// Runs a write or DDL statement and returns the affected-row count.
    ///
    /// With `autocommit` off, a transaction is begun if none is pending and
    /// left open.
    pub fn execute(&self, sql: &str, params: &[Value], autocommit: bool) -> Result<usize> {
        let rows_affected = self.with_connection(|conn| {
            if !autocommit && conn.is_autocommit() {
                conn.execute_batch("BEGIN")?;
            }
            Ok(conn.execute(sql, params_from_iter(params))?)
        })?;
        if autocommit {
            self.commit()?;
        }
        info!(rows_affected, "rows affected");
        Ok(rows_affected)
    }

    /// Commits the pending transaction, if any.
    pub fn commit(&self) -> Result<()> {
        self.with_connection(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT")?;
                debug!("transaction committed");
            }
            Ok(())
        })
    }

    /// Whether uncommitted work is pending.
    pub fn in_transaction(&self) -> Result<bool> {
        self.with_connection(|conn| Ok(!conn.is_autocommit()))
    }

    /// Rowid assigned by the most recent successful insert.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        self.with_connection(|conn| Ok(conn.last_insert_rowid()))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
