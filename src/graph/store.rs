//! Graph storage backend trait and implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, params};

use crate::config::{DatabaseConfig, GraphKind};
use crate::net::AsnRecord;

/// Error type for graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The configuration entry could not produce a backend.
    #[error("failed to open {kind} graph store: {reason}")]
    Open { kind: &'static str, reason: String },

    /// Operation attempted after the store was closed.
    #[error("graph store is closed")]
    Closed,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Storage backend for reconnaissance findings.
///
/// The orchestrator only ever seeds netblock observations and tears the
/// store down; richer write paths belong to the engine's enumeration
/// stages, not to system composition.
pub trait GraphStore: Send + Sync {
    /// Insert or update a netblock observation.
    fn upsert_netblock(&self, record: &AsnRecord) -> Result<(), StoreError>;

    /// Number of stored netblocks.
    fn netblock_count(&self) -> Result<usize, StoreError>;

    /// Human-readable description of the backend.
    fn describe(&self) -> String;

    /// Release the backend. Idempotent; later operations fail with
    /// [`StoreError::Closed`].
    fn close(&self);
}

/// Open the store for a configuration entry.
pub fn open_store(db: &DatabaseConfig) -> Result<Box<dyn GraphStore>, StoreError> {
    match db.kind {
        GraphKind::Sqlite => {
            let path = db.path.as_deref().ok_or_else(|| StoreError::Open {
                kind: "sqlite",
                reason: "no path configured".to_string(),
            })?;
            Ok(Box::new(SqliteStore::open(path)?))
        }
        GraphKind::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS netblocks (
    cidr        TEXT PRIMARY KEY,
    asn         INTEGER NOT NULL,
    cc          TEXT NOT NULL,
    description TEXT NOT NULL
);
";

/// Durable store backed by a sqlite database file.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: path.to_path_buf(),
        })
    }

    /// In-memory sqlite database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: PathBuf::from(":memory:"),
        })
    }
}

impl GraphStore for SqliteStore {
    fn upsert_netblock(&self, record: &AsnRecord) -> Result<(), StoreError> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        conn.execute(
            "INSERT INTO netblocks (cidr, asn, cc, description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cidr) DO UPDATE SET
                 asn = excluded.asn,
                 cc = excluded.cc,
                 description = excluded.description",
            params![
                record.prefix.to_string(),
                record.asn,
                record.cc,
                record.description
            ],
        )?;
        Ok(())
    }

    fn netblock_count(&self) -> Result<usize, StoreError> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM netblocks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            let _ = conn.close();
        }
    }
}

/// Volatile store holding netblocks in a map.
#[derive(Default)]
pub struct MemoryStore {
    netblocks: Mutex<Option<HashMap<String, AsnRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            netblocks: Mutex::new(Some(HashMap::new())),
        }
    }
}

impl GraphStore for MemoryStore {
    fn upsert_netblock(&self, record: &AsnRecord) -> Result<(), StoreError> {
        let mut guard = self.netblocks.lock();
        let map = guard.as_mut().ok_or(StoreError::Closed)?;
        map.insert(record.prefix.to_string(), record.clone());
        Ok(())
    }

    fn netblock_count(&self) -> Result<usize, StoreError> {
        let guard = self.netblocks.lock();
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(map.len())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn close(&self) {
        self.netblocks.lock().take();
    }
}
