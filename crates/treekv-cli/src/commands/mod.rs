//! Command handlers

pub mod bulk;
pub mod config;
pub mod keys;

use anyhow::{Context, Result};

use treekv_core::{Config, KvStore};

/// Pick the store URI from the command line, falling back to the config
pub fn resolve_store(arg: Option<String>, config: &Config) -> Result<String> {
    arg.or_else(|| config.default_store.clone()).context(
        "No store given. Pass a store URI or set default_store \
         (TREEKV_STORE or the config file).",
    )
}

/// Open a store named on the command line or in the config
pub fn open_store(arg: Option<String>, config: &Config) -> Result<Box<dyn KvStore>> {
    let uri = resolve_store(arg, config)?;
    treekv_core::open(&uri).with_context(|| format!("Failed to open store '{}'", uri))
}
