//! Single-key and listing command handlers

use std::io::Read;

use anyhow::{Context, Result};

use treekv_core::key::descendant_prefix;
use treekv_core::KvStore;

use crate::output::Output;

/// Print the value stored under `key`
pub fn get(store: &dyn KvStore, key: &str, output: &Output) -> Result<()> {
    let value = store
        .get(key)
        .with_context(|| format!("Failed to read '{}'", key))?;
    output.print_value(key, &value)?;
    Ok(())
}

/// Store a value, reading it from `input` when not given inline
pub fn put(
    store: &mut dyn KvStore,
    key: &str,
    value: Option<String>,
    input: &mut dyn Read,
    output: &Output,
) -> Result<()> {
    let bytes = match value {
        Some(value) => value.into_bytes(),
        None => {
            let mut buf = Vec::new();
            input
                .read_to_end(&mut buf)
                .context("Failed to read value from stdin")?;
            buf
        }
    };

    store
        .put(key, &bytes)
        .with_context(|| format!("Failed to write '{}'", key))?;
    store.commit()?;
    store.close()?;

    output.success(&format!("Stored {} byte(s) at {}", bytes.len(), key));
    Ok(())
}

/// Immediate children of `prefix`, sorted
pub fn children(store: &dyn KvStore, prefix: &str) -> Result<Vec<String>> {
    let mut keys = store
        .list(prefix)
        .with_context(|| format!("Failed to list '{}'", prefix))?;
    keys.sort();
    Ok(keys)
}

/// Every leaf key under `prefix`, sorted
///
/// Backends without subtree walks are served by filtering a full scan.
pub fn leaves(store: &dyn KvStore, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let walked = store.iterate_subtree(prefix, &mut |key| {
        keys.push(key.to_string());
        Ok(())
    });

    match walked {
        Err(e) if e.is_unsupported() => {
            let dir = descendant_prefix(prefix);
            store.iterate_all(&mut |key| {
                if key.starts_with(&dir) {
                    keys.push(key.to_string());
                }
                Ok(())
            })?;
        }
        result => result.with_context(|| format!("Failed to walk '{}'", prefix))?,
    }

    keys.sort();
    Ok(keys)
}

pub fn ls(store: &dyn KvStore, prefix: &str, output: &Output) -> Result<()> {
    output.print_keys(&children(store, prefix)?);
    Ok(())
}

pub fn tree(store: &dyn KvStore, prefix: &str, output: &Output) -> Result<()> {
    output.print_keys(&leaves(store, prefix)?);
    Ok(())
}
