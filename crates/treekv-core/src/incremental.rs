//! Incremental task execution
//!
//! A task processes everything newer than the stored watermark and reports
//! how far it got. The new watermark is written only after the task
//! succeeds, so a failed or interrupted run leaves the previous one in place
//! and the next run repeats the work.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::store::KvStore;

/// Runs a task from the last persisted watermark
pub struct Incremental<S> {
    store: S,
    key: String,
}

impl<S: KvStore> Incremental<S> {
    /// Track the watermark stored under `key`
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Key holding the watermark
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Current watermark, or the Unix epoch if none is usable
    pub fn last_update(&self) -> DateTime<Utc> {
        if !self.store.contains(&self.key) {
            return DateTime::<Utc>::UNIX_EPOCH;
        }

        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Can't read watermark '{}', starting from epoch: {}", self.key, e);
                return DateTime::<Utc>::UNIX_EPOCH;
            }
        };

        let text = String::from_utf8_lossy(&raw);
        match DateTime::parse_from_rfc3339(text.trim()) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    "Watermark '{}' is not an RFC 3339 time ({:?}), starting from epoch: {}",
                    self.key, text, e
                );
                DateTime::<Utc>::UNIX_EPOCH
            }
        }
    }

    /// Run `task` from the last watermark and persist the one it returns
    ///
    /// Returns whether the watermark moved forward. A failing task leaves
    /// the stored watermark untouched.
    pub fn update<F>(&mut self, task: F) -> Result<bool>
    where
        F: FnOnce(DateTime<Utc>) -> Result<DateTime<Utc>>,
    {
        let last_update = self.last_update();
        debug!("Running incremental task '{}' from {}", self.key, last_update);

        let done_until = task(last_update).context("Execution of task failed")?;
        let did_work = done_until > last_update;

        let encoded = done_until.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.store
            .put(&self.key, encoded.as_bytes())
            .with_context(|| format!("Couldn't store new watermark for '{}'", self.key))?;
        self.store
            .commit()
            .with_context(|| format!("Couldn't commit new watermark for '{}'", self.key))?;

        Ok(did_work)
    }
}
