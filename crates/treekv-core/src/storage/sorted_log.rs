//! LSM-tree backend
//!
//! The engine only knows a flat, lexicographically sorted keyspace. The
//! hierarchy is synthesized on read: listing seeks to the first key under
//! the prefix and walks forward, collapsing deeper keys into their first
//! segment (see [`key::visit_children`]).
//!
//! The engine keeps no modification times, so `is_changed` always answers
//! `true`. Do not use this backend where freshness checks matter.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::key::{self, Visitor};
use crate::store::KvStore;

const PARTITION: &str = "kv";

/// Store backed by a `fjall` keyspace
pub struct SortedLogStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    path: PathBuf,
    closed: bool,
}

impl SortedLogStore {
    /// Open or create the keyspace in directory `path`
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();
        let keyspace = Config::new(&path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened LSM store at {:?}", path);
        Ok(Self {
            keyspace,
            partition,
            path,
            closed: false,
        })
    }

    /// Keyspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys in sorted order starting at the first key `>= start`
    fn keys_from(&self, start: &str) -> impl Iterator<Item = KvResult<String>> + '_ {
        self.partition
            .range(start.as_bytes().to_vec()..)
            .map(|item| decode_key(item.map(|(key, _)| key)))
    }
}

fn decode_key(key: fjall::Result<fjall::Slice>) -> KvResult<String> {
    let key = key?;
    String::from_utf8(key.to_vec()).map_err(|e| KvError::InvalidKey(e.to_string()))
}

impl KvStore for SortedLogStore {
    fn backend(&self) -> &'static str {
        "pebble"
    }

    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()> {
        let key = key::entry(key)?;
        self.partition.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        let key = key::entry(key)?;
        self.partition
            .get(key.as_bytes())?
            .map(|value| value.to_vec())
            .ok_or_else(|| KvError::NotFound {
                key: key.to_string(),
            })
    }

    fn contains(&self, key: &str) -> bool {
        let Ok(key) = key::entry(key) else {
            return false;
        };
        match self.partition.contains_key(key.as_bytes()) {
            Ok(found) => found,
            Err(e) => {
                warn!("Could not look up '{}': {}", key, e);
                false
            }
        }
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        let prefix = key::normalize(prefix)?;
        let start = key::descendant_prefix(prefix);
        key::visit_children(self.keys_from(&start), prefix, visit)
    }

    fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        for item in self.partition.iter() {
            let key = decode_key(item.map(|(key, _)| key))?;
            visit(&key)?;
        }
        Ok(())
    }

    fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        let prefix = key::normalize(prefix)?;
        if prefix.is_empty() {
            return self.iterate_all(visit);
        }

        if self.contains(prefix) {
            visit(prefix)?;
        }
        let dir = key::descendant_prefix(prefix);
        for item in self.partition.prefix(dir.as_bytes()) {
            let key = decode_key(item.map(|(key, _)| key))?;
            visit(&key)?;
        }
        Ok(())
    }

    fn is_changed(&self, _since: DateTime<Utc>, _key: &str) -> KvResult<bool> {
        Ok(true)
    }

    fn commit(&mut self) -> KvResult<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn close(&mut self) -> KvResult<()> {
        if self.closed {
            return Ok(());
        }
        self.commit()?;
        self.closed = true;
        debug!("Closed LSM store at {:?}", self.path);
        Ok(())
    }
}
