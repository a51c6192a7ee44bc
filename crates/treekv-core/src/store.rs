//! Unified storage interface
//!
//! `KvStore` is the one contract every backend satisfies. Callers program
//! against it (usually as `Box<dyn KvStore>` from [`crate::open`]) and never
//! see which engine holds the data.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = treekv_core::open("sql:/tmp/data.db?batch=500")?;
//!
//! store.put("repos/treekv/stars", b"42")?;
//! let children = store.list("repos")?; // ["repos/treekv"]
//!
//! store.close()?;
//! ```

use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};

use crate::error::KvResult;
use crate::key::{ValueVisitor, Visitor};

/// Produces the value for a missing key in [`KvStore::get_or_default`]
pub type Provider<'a> = dyn FnMut(&str) -> KvResult<Vec<u8>> + 'a;

/// Hierarchical key-value store
///
/// Keys are `/`-separated paths. Listing is shallow (immediate children),
/// the `iterate_all` / `iterate_subtree` walks are recursive and visit leaf
/// keys only. Every traversal stops at the first error returned by the
/// visitor and hands that error back unchanged.
pub trait KvStore {
    /// Short backend name used in logs and errors
    fn backend(&self) -> &'static str;

    /// Create or overwrite an entry
    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()>;

    /// Read an entry, failing with `KvError::NotFound` when absent
    fn get(&self, key: &str) -> KvResult<Vec<u8>>;

    /// Stream an entry
    fn get_reader(&self, key: &str) -> KvResult<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.get(key)?)))
    }

    /// Check if an entry exists. Never fails; engine errors read as absent.
    fn contains(&self, key: &str) -> bool;

    /// Immediate children of `prefix`: leaf keys and one-level sub-prefixes
    fn list(&self, prefix: &str) -> KvResult<Vec<String>> {
        let mut keys = Vec::new();
        self.iterate(prefix, &mut |key| {
            keys.push(key.to_string());
            Ok(())
        })?;
        Ok(keys)
    }

    /// Visit the immediate children of `prefix`
    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()>;

    /// Visit the leaf children of `prefix` together with their values
    ///
    /// Sub-prefixes are skipped.
    fn iterate_values(&self, prefix: &str, visit: &mut ValueVisitor<'_>) -> KvResult<()> {
        self.iterate(prefix, &mut |child| {
            if !self.contains(child) {
                return Ok(());
            }
            let value = self.get(child)?;
            visit(child, &value)
        })
    }

    /// Visit every leaf key in the store
    fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        self.iterate_subtree("", visit)
    }

    /// Visit every leaf key under `prefix`, at any depth
    fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()>;

    /// Read an entry, filling it from `provider` on a miss
    ///
    /// The provider runs at most once; its value is stored before it is
    /// returned, so the next `get` is served from the store.
    fn get_or_default(&mut self, key: &str, provider: &mut Provider<'_>) -> KvResult<Vec<u8>> {
        if self.contains(key) {
            return self.get(key);
        }
        let value = provider(key)?;
        self.put(key, &value)?;
        Ok(value)
    }

    /// Whether the entry was modified strictly after `since`
    ///
    /// Backends without modification tracking answer `true`.
    fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool>;

    /// Flush writes buffered by the backend
    fn commit(&mut self) -> KvResult<()> {
        Ok(())
    }

    /// Release backend resources. Safe to call more than once.
    fn close(&mut self) -> KvResult<()> {
        Ok(())
    }
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        (**self).get(key)
    }

    fn get_reader(&self, key: &str) -> KvResult<Box<dyn Read + '_>> {
        (**self).get_reader(key)
    }

    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn list(&self, prefix: &str) -> KvResult<Vec<String>> {
        (**self).list(prefix)
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate(prefix, visit)
    }

    fn iterate_values(&self, prefix: &str, visit: &mut ValueVisitor<'_>) -> KvResult<()> {
        (**self).iterate_values(prefix, visit)
    }

    fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate_all(visit)
    }

    fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate_subtree(prefix, visit)
    }

    fn get_or_default(&mut self, key: &str, provider: &mut Provider<'_>) -> KvResult<Vec<u8>> {
        (**self).get_or_default(key, provider)
    }

    fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool> {
        (**self).is_changed(since, key)
    }

    fn commit(&mut self) -> KvResult<()> {
        (**self).commit()
    }

    fn close(&mut self) -> KvResult<()> {
        (**self).close()
    }
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        (**self).get(key)
    }

    fn get_reader(&self, key: &str) -> KvResult<Box<dyn Read + '_>> {
        (**self).get_reader(key)
    }

    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn list(&self, prefix: &str) -> KvResult<Vec<String>> {
        (**self).list(prefix)
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate(prefix, visit)
    }

    fn iterate_values(&self, prefix: &str, visit: &mut ValueVisitor<'_>) -> KvResult<()> {
        (**self).iterate_values(prefix, visit)
    }

    fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate_all(visit)
    }

    fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        (**self).iterate_subtree(prefix, visit)
    }

    fn get_or_default(&mut self, key: &str, provider: &mut Provider<'_>) -> KvResult<Vec<u8>> {
        (**self).get_or_default(key, provider)
    }

    fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool> {
        (**self).is_changed(since, key)
    }

    fn commit(&mut self) -> KvResult<()> {
        (**self).commit()
    }

    fn close(&mut self) -> KvResult<()> {
        (**self).close()
    }
}

/// Copy every entry of `from` into `to`, returning the number of keys copied
pub fn copy(from: &dyn KvStore, to: &mut dyn KvStore) -> KvResult<usize> {
    copy_with_progress(from, to, &mut |_| {})
}

/// Like [`copy`], reporting the running count after each key
pub fn copy_with_progress(
    from: &dyn KvStore,
    to: &mut dyn KvStore,
    progress: &mut dyn FnMut(usize),
) -> KvResult<usize> {
    let mut copied = 0;
    from.iterate_all(&mut |key| {
        let value = from.get(key)?;
        to.put(key, &value)?;
        copied += 1;
        progress(copied);
        Ok(())
    })?;
    Ok(copied)
}
