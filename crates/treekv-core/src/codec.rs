//! Typed views over a byte store
//!
//! An [`EncodedStore`] pairs any [`KvStore`] with a [`Codec`] so callers
//! read and write domain values instead of bytes. [`JsonCodec`] defaults to
//! `serde_json::Value`, giving a dynamic but still tagged view
//! (null/bool/number/string/array/object); any serde type works as well.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::KvResult;
use crate::key::Visitor;
use crate::store::KvStore;

/// Converts between a domain value and its byte encoding
pub trait Codec {
    type Value;

    fn encode(&self, value: &Self::Value) -> KvResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> KvResult<Self::Value>;
}

/// JSON encoding through `serde_json`
pub struct JsonCodec<T = serde_json::Value> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec for JsonCodec<T> {
    type Value = T;

    fn encode(&self, value: &T) -> KvResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> KvResult<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A store that encodes values on the way in and decodes them on the way out
pub struct EncodedStore<S, C> {
    delegate: S,
    codec: C,
}

/// Wrap a store in a JSON view over `serde_json::Value`
pub fn json_store<S: KvStore>(store: S) -> EncodedStore<S, JsonCodec> {
    EncodedStore::new(store, JsonCodec::new())
}

impl<S: KvStore, C: Codec> EncodedStore<S, C> {
    pub fn new(delegate: S, codec: C) -> Self {
        Self { delegate, codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn inner(&self) -> &S {
        &self.delegate
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.delegate
    }

    pub fn into_inner(self) -> S {
        self.delegate
    }

    /// Encode and store a value
    pub fn put(&mut self, key: &str, value: &C::Value) -> KvResult<()> {
        let bytes = self.codec.encode(value)?;
        self.delegate.put(key, &bytes)
    }

    /// Read and decode a value
    pub fn get(&self, key: &str) -> KvResult<C::Value> {
        let bytes = self.delegate.get(key)?;
        self.codec.decode(&bytes)
    }

    /// Read a value, or return `provider`'s value on a miss
    ///
    /// Unlike [`KvStore::get_or_default`], the provided value is handed back
    /// as is and not written to the store.
    pub fn get_or_default<F>(&self, key: &str, provider: F) -> KvResult<C::Value>
    where
        F: FnOnce(&str) -> KvResult<C::Value>,
    {
        if !self.delegate.contains(key) {
            return provider(key);
        }
        self.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.delegate.contains(key)
    }

    pub fn list(&self, prefix: &str) -> KvResult<Vec<String>> {
        self.delegate.list(prefix)
    }

    pub fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        self.delegate.iterate(prefix, visit)
    }

    pub fn iterate_all(&self, visit: &mut Visitor<'_>) -> KvResult<()> {
        self.delegate.iterate_all(visit)
    }

    pub fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        self.delegate.iterate_subtree(prefix, visit)
    }

    pub fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool> {
        self.delegate.is_changed(since, key)
    }

    pub fn commit(&mut self) -> KvResult<()> {
        self.delegate.commit()
    }

    pub fn close(&mut self) -> KvResult<()> {
        self.delegate.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvError;
    use crate::storage::FileTreeStore;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileTreeStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTreeStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_json_decode_to_map() {
        let codec = JsonCodec::<Value>::new();
        let value = codec.decode(br#"{"asd":"qwe"}"#).unwrap();
        assert_eq!(value["asd"], "qwe");
    }

    #[test]
    fn test_put_then_get_decodes() {
        let (_dir, store) = store();
        let mut view = json_store(store);

        view.put("repo/meta", &json!({"stars": 3, "tags": ["a", "b"]}))
            .unwrap();
        let value = view.get("repo/meta").unwrap();

        assert_eq!(value["stars"], 3);
        assert_eq!(value["tags"][1], "b");
        assert_eq!(view.inner().get("repo/meta").unwrap(), br#"{"stars":3,"tags":["a","b"]}"#);
    }

    #[test]
    fn test_get_or_default_does_not_persist() {
        let (_dir, store) = store();
        let view = json_store(store);

        let mut calls = 0;
        let value = view
            .get_or_default("missing", |key| {
                calls += 1;
                Ok(json!({ "key": key }))
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(value["key"], "missing");
        assert!(!view.contains("missing"));
    }

    #[test]
    fn test_get_or_default_reads_existing() {
        let (_dir, store) = store();
        let mut view = json_store(store);
        view.put("present", &json!(true)).unwrap();

        let value = view
            .get_or_default("present", |_| panic!("provider must not run"))
            .unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn test_decode_failure_surfaces_codec_error() {
        let (_dir, mut store) = store();
        store.put("broken", b"{not json").unwrap();
        let view = json_store(store);

        assert!(matches!(view.get("broken"), Err(KvError::Codec(_))));
    }

    #[test]
    fn test_typed_view() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Issue {
            id: u32,
            title: String,
        }

        let (_dir, store) = store();
        let mut view = EncodedStore::new(store, JsonCodec::<Issue>::new());
        let issue = Issue {
            id: 7,
            title: "Listing returns grandchildren".to_string(),
        };

        view.put("issues/7", &issue).unwrap();
        assert_eq!(view.get("issues/7").unwrap(), issue);
        assert_eq!(view.list("issues").unwrap(), vec!["issues/7".to_string()]);
    }
}
