//! SQLite backend
//!
//! Entries live in the `key` table under their parent prefix. Every put also
//! records the key's ancestor directories in the `prefix` table, so listing
//! any prefix is two indexed lookups (entries and sub-prefixes with that
//! parent) and never a scan.
//!
//! ## Batching
//!
//! With a batch size, puts run inside an explicit transaction that commits
//! every `batch` puts. Call [`KvStore::commit`] to flush a partial batch
//! before relying on reads. Without a batch size every put auto-commits.
//!
//! The ancestor cache and the open transaction are plain fields mutated
//! through `&mut self`; sharing a store across threads needs outside
//! synchronization.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::key::{self, ValueVisitor, Visitor};
use crate::storage::schema::{init_schema, needs_init};
use crate::store::KvStore;

/// Store backed by a SQLite database file
pub struct RelationalStore {
    conn: Connection,
    path: PathBuf,
    /// Parent prefixes whose ancestor rows are already written
    known_prefixes: HashSet<String>,
    batch_size: Option<usize>,
    /// Puts executed inside the open transaction
    pending: usize,
    in_transaction: bool,
    closed: bool,
}

impl RelationalStore {
    /// Open or create the database at `path`
    ///
    /// `batch_size` of `None` makes every write auto-commit.
    pub fn open(path: impl AsRef<Path>, batch_size: Option<usize>) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| KvError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        Self::with_connection(conn, path, batch_size)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(batch_size: Option<usize>) -> KvResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"), batch_size)
    }

    fn with_connection(
        conn: Connection,
        path: PathBuf,
        batch_size: Option<usize>,
    ) -> KvResult<Self> {
        conn.execute_batch("PRAGMA synchronous = OFF;")?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened SQLite store at {:?} (batch: {:?})", path, batch_size);
        Ok(Self {
            conn,
            path,
            known_prefixes: HashSet::new(),
            batch_size,
            pending: 0,
            in_transaction: false,
            closed: false,
        })
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of puts per transaction, if batching
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin_if_batching(&mut self) -> KvResult<()> {
        if self.batch_size.is_some() && !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn count_put(&mut self) -> KvResult<()> {
        if let Some(size) = self.batch_size {
            self.pending += 1;
            if self.pending >= size {
                self.commit()?;
            }
        }
        Ok(())
    }

    /// Record every ancestor of `key` in the prefix table
    fn register_ancestors(&mut self, key: &str) -> KvResult<()> {
        let parent = key::parent(key);
        if self.known_prefixes.contains(parent) {
            return Ok(());
        }

        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO prefix (prefix, key) VALUES (?1, ?2) ON CONFLICT DO NOTHING")?;
        for ancestor in key::ancestors(key) {
            stmt.execute(params![key::parent(ancestor), key::base(ancestor)])?;
        }
        drop(stmt);

        self.known_prefixes.insert(parent.to_string());
        Ok(())
    }

    fn visit_names(
        &self,
        sql: &str,
        prefix: &str,
        visit: &mut Visitor<'_>,
    ) -> KvResult<()> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt.query(params![prefix])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            visit(&key::join(prefix, &name))?;
        }
        Ok(())
    }
}

impl KvStore for RelationalStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()> {
        let key = key::entry(key)?;
        self.begin_if_batching()?;
        self.register_ancestors(key)?;

        self.conn.execute(
            r#"
            INSERT INTO key (prefix, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (prefix, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![
                key::parent(key),
                key::base(key),
                value,
                Utc::now().timestamp_millis()
            ],
        )?;

        self.count_put()
    }

    fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        let key = key::entry(key)?;
        self.conn
            .query_row(
                "SELECT value FROM key WHERE prefix = ?1 AND key = ?2",
                params![key::parent(key), key::base(key)],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or_else(|| KvError::NotFound {
                key: key.to_string(),
            })
    }

    fn contains(&self, key: &str) -> bool {
        let Ok(key) = key::entry(key) else {
            return false;
        };
        let exists = self
            .conn
            .prepare_cached("SELECT 1 FROM key WHERE prefix = ?1 AND key = ?2")
            .and_then(|mut stmt| stmt.exists(params![key::parent(key), key::base(key)]));

        match exists {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Could not look up '{}': {}", key, e);
                false
            }
        }
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        let prefix = key::normalize(prefix)?;
        // a name that is both an entry and a sub-prefix is listed once
        self.visit_names(
            "SELECT key FROM key WHERE prefix = ?1 UNION SELECT key FROM prefix WHERE prefix = ?1",
            prefix,
            visit,
        )
    }

    fn iterate_values(&self, prefix: &str, visit: &mut ValueVisitor<'_>) -> KvResult<()> {
        let prefix = key::normalize(prefix)?;
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM key WHERE prefix = ?1")?;
        let mut rows = stmt.query(params![prefix])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let value: Vec<u8> = row.get(1)?;
            visit(&key::join(prefix, &name), &value)?;
        }
        Ok(())
    }

    fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT prefix, key FROM key ORDER BY prefix, key")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let prefix: String = row.get(0)?;
            let name: String = row.get(1)?;
            visit(&key::join(&prefix, &name))?;
        }
        Ok(())
    }

    fn iterate_subtree(&self, _prefix: &str, _visit: &mut Visitor<'_>) -> KvResult<()> {
        Err(KvError::unsupported("iterate_subtree", self.backend()))
    }

    fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool> {
        let key = key::entry(key)?;
        let updated_at: Option<i64> = self
            .conn
            .query_row(
                "SELECT updated_at FROM key WHERE prefix = ?1 AND key = ?2",
                params![key::parent(key), key::base(key)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match updated_at {
            Some(millis) => millis > since.timestamp_millis(),
            None => true,
        })
    }

    fn commit(&mut self) -> KvResult<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            debug!("Committed batch of {} puts to {:?}", self.pending, self.path);
            self.in_transaction = false;
            self.pending = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> KvResult<()> {
        if self.closed {
            return Ok(());
        }
        self.commit()?;
        self.closed = true;
        debug!("Closed SQLite store at {:?}", self.path);
        Ok(())
    }
}

impl Drop for RelationalStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to flush SQLite store {:?} on drop: {}", self.path, e);
        }
    }
}
