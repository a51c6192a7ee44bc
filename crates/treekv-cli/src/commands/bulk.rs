//! Whole-store command handlers: copy, count and the insert stress test

use std::time::Instant;

use anyhow::{Context, Result};
use rand::RngCore;
use tracing::info;

use treekv_core::KvStore;

use crate::output::Output;

/// Shape of the insert stress test
#[derive(Debug, Clone, Copy)]
pub struct InsertPlan {
    pub dirs: usize,
    pub per_dir: usize,
    pub value_size: usize,
}

impl InsertPlan {
    pub fn total(&self) -> usize {
        self.dirs * self.per_dir
    }
}

/// Copy every key of `from` into `to`, then flush and close `to`
pub fn copy(from: &dyn KvStore, to: &mut dyn KvStore, output: &Output) -> Result<usize> {
    let bar = output.progress(None);
    let copied = treekv_core::copy_with_progress(from, to, &mut |n| bar.set_position(n as u64))
        .context("Copy failed")?;
    bar.finish_and_clear();

    to.commit().context("Failed to commit target store")?;
    to.close().context("Failed to close target store")?;

    info!("Copied {} keys from {} to {}", copied, from.backend(), to.backend());
    output.success(&format!("Copied {} key(s)", copied));
    Ok(copied)
}

/// Count every leaf key in the store
pub fn count(store: &dyn KvStore, output: &Output) -> Result<usize> {
    let bar = output.progress(None);
    let mut counter = 0;
    store
        .iterate_all(&mut |_| {
            counter += 1;
            bar.inc(1);
            Ok(())
        })
        .context("Failed to iterate store")?;
    bar.finish_and_clear();

    output.print_count(counter);
    Ok(counter)
}

/// Write `plan.total()` random values as `key<j>/<i>`
pub fn inserts(store: &mut dyn KvStore, plan: InsertPlan, output: &Output) -> Result<usize> {
    let bar = output.progress(Some(plan.total() as u64));
    let mut rng = rand::thread_rng();
    let mut buffer = vec![0u8; plan.value_size];
    let started = Instant::now();

    for j in 0..plan.dirs {
        for i in 0..plan.per_dir {
            rng.fill_bytes(&mut buffer);
            let key = format!("key{}/{}", j, i);
            store
                .put(&key, &buffer)
                .with_context(|| format!("Failed to write '{}'", key))?;
            bar.inc(1);
        }
    }
    store.commit().context("Failed to commit store")?;
    bar.finish_and_clear();

    let elapsed = started.elapsed();
    let total = plan.total();
    info!("Inserted {} keys in {:?}", total, elapsed);
    output.success(&format!(
        "Inserted {} key(s) of {} bytes in {:.2}s",
        total,
        plan.value_size,
        elapsed.as_secs_f64()
    ));
    Ok(total)
}
