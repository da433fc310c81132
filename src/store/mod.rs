//! Store (C1): the embedded relational database.
//!
//! A single `rusqlite::Connection` opened with WAL journaling and
//! foreign-key enforcement, guarded by one plain mutex. `Connection`
//! caches prepared statements internally and is `Send` but not `Sync`,
//! so an `RwLock<Connection>` shared across threads would still only
//! ever be safe to access one guard at a time in practice — rusqlite's
//! own guidance is to gate a shared connection behind a `Mutex`, never
//! an `RwLock`, and that's what every reader and writer here goes
//! through.

mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::StateConfig;
use crate::error::Result;

pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Opens (creating if absent) the main store at `config.db_path`,
    /// enabling WAL mode and foreign-key enforcement, and creates the
    /// schema idempotently.
    pub fn open(config: &StateConfig) -> Result<Self> {
        Self::open_at(&config.db_path, 0o755, schema::SCHEMA)
    }

    /// Opens (creating if absent) the secrets store at
    /// `config.secrets_db_path`, in its own file so the containing
    /// directory can be locked down to owner-only (`0700`)
    /// permissions, independent of the main store's directory.
    pub fn open_secrets(config: &StateConfig) -> Result<Self> {
        Self::open_at(&config.secrets_db_path, 0o700, schema::SECRETS_SCHEMA)
    }

    fn open_at(path: &Path, dir_mode: u32, schema: &str) -> Result<Self> {
        StateConfig::ensure_parent_dir(path, dir_mode)?;
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        conn.execute_batch(schema)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Opens an in-memory store, used for tests that don't care about
    /// on-disk persistence (WAL/FK pragmas still apply to the extent
    /// SQLite supports them for `:memory:`).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_schema(schema::SCHEMA)
    }

    /// Same as [`Self::open_in_memory`] but against the secrets schema,
    /// for tests of the secrets repository that don't need a real file.
    pub fn open_secrets_in_memory() -> Result<Self> {
        Self::open_in_memory_with_schema(schema::SECRETS_SCHEMA)
    }

    fn open_in_memory_with_schema(schema: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        conn.execute_batch(schema)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL").or_else(|_| {
            // :memory: databases silently ignore WAL and stay in the
            // default rollback-journal mode; that's fine for tests.
            conn.pragma_update(None, "journal_mode", "MEMORY")
        })?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the connection's guard for read-only queries. Named
    /// distinctly from [`Self::write`] for call-site clarity even
    /// though both now serialize through the same mutex.
    pub fn read(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }

    /// Acquires the connection's guard for mutating statements.
    pub fn write(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }
}
