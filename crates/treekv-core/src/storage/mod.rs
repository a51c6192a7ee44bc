//! Storage backends
//!
//! Three engines behind the same [`KvStore`](crate::KvStore) contract:
//!
//! - **Directory tree** (`FileTreeStore`): one file per key
//! - **LSM-tree** (`SortedLogStore`): flat sorted keyspace, hierarchy
//!   synthesized on read
//! - **SQLite** (`RelationalStore`): entry and prefix tables, optional
//!   batched transactions

pub mod file_tree;
pub mod relational;
pub mod schema;
pub mod sorted_log;

pub use file_tree::FileTreeStore;
pub use relational::RelationalStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sorted_log::SortedLogStore;
