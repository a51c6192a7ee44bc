//! TreeKV Core Library
//!
//! A hierarchical key-value store with interchangeable backends. Keys are
//! `/`-separated paths; the same contract is served by a directory tree, an
//! LSM-tree engine, and a SQLite database.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = treekv_core::open("pebble:/var/lib/treekv")?;
//!
//! store.put("dir1/key1", b"v1")?;
//! store.put("dir1/dir2/key3", b"v3")?;
//!
//! let children = store.list("dir1")?; // ["dir1/dir2", "dir1/key1"]
//! store.close()?;
//! ```
//!
//! # Modules
//!
//! - `store`: The `KvStore` contract and cross-store copy
//! - `storage`: Backend implementations (dir, pebble, sql)
//! - `open`: Store URIs and the backend dispatcher
//! - `codec`: Typed views over a byte store
//! - `incremental`: Watermark-driven incremental tasks
//! - `cache`: Time-validated file cache for expensive fetches
//! - `config`: Application configuration

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod incremental;
pub mod key;
pub mod open;
pub mod storage;
pub mod store;

#[cfg(test)]
mod contract_tests;

pub use cache::{CacheValidator, FileCache, Freshness};
pub use codec::{json_store, Codec, EncodedStore, JsonCodec};
pub use config::Config;
pub use error::{KvError, KvResult};
pub use incremental::Incremental;
pub use key::{ValueVisitor, Visitor};
pub use open::{open, StoreUri};
pub use storage::{FileTreeStore, RelationalStore, SortedLogStore};
pub use store::{copy, copy_with_progress, KvStore, Provider};
