//! Store construction from connection strings
//!
//! | URI | Backend |
//! |-----|---------|
//! | `<path>` | directory tree rooted at `<path>` |
//! | `pebble:<path>` | LSM-tree keyspace in `<path>` |
//! | `sql:<path>[?batch=<N>]` | SQLite database at `<path>`, committing every `N` puts |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::error::{KvError, KvResult};
use crate::storage::{FileTreeStore, RelationalStore, SortedLogStore};
use crate::store::KvStore;

/// Parsed store connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// Plain path: one file per key
    FileTree(PathBuf),
    /// `pebble:<path>`
    SortedLog(PathBuf),
    /// `sql:<path>[?batch=<N>]`
    Relational { path: PathBuf, batch: Option<usize> },
}

impl StoreUri {
    /// Build the backend this URI names
    pub fn open(&self) -> KvResult<Box<dyn KvStore>> {
        let store: Box<dyn KvStore> = match self {
            StoreUri::FileTree(path) => Box::new(FileTreeStore::open(path)?),
            StoreUri::SortedLog(path) => Box::new(SortedLogStore::open(path)?),
            StoreUri::Relational { path, batch } => Box::new(RelationalStore::open(path, *batch)?),
        };
        Ok(store)
    }
}

impl FromStr for StoreUri {
    type Err = KvError;

    fn from_str(uri: &str) -> KvResult<Self> {
        let invalid = |reason: &str| KvError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        if uri.is_empty() {
            return Err(invalid("empty store URI"));
        }

        match uri.split_once(':') {
            None => Ok(StoreUri::FileTree(PathBuf::from(uri))),
            Some(("pebble", path)) => {
                if path.is_empty() {
                    return Err(invalid("missing path"));
                }
                Ok(StoreUri::SortedLog(PathBuf::from(path)))
            }
            Some(("sql", rest)) => {
                let (path, query) = match rest.split_once('?') {
                    Some((path, query)) => (path, Some(query)),
                    None => (rest, None),
                };
                if path.is_empty() {
                    return Err(invalid("missing path"));
                }

                let mut batch = None;
                for param in query.into_iter().flat_map(|q| q.split('&')) {
                    match param.split_once('=') {
                        Some(("batch", value)) => {
                            let size: usize = value
                                .parse()
                                .map_err(|_| invalid("batch must be a non-negative integer"))?;
                            batch = (size > 0).then_some(size);
                        }
                        _ if param.is_empty() => {}
                        _ => warn!("Ignoring unknown parameter '{}' in '{}'", param, uri),
                    }
                }

                Ok(StoreUri::Relational {
                    path: PathBuf::from(path),
                    batch,
                })
            }
            Some((scheme, _)) => Err(KvError::UnknownProtocol(scheme.to_string())),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::FileTree(path) => write!(f, "{}", path.display()),
            StoreUri::SortedLog(path) => write!(f, "pebble:{}", path.display()),
            StoreUri::Relational { path, batch } => {
                write!(f, "sql:{}", path.display())?;
                if let Some(batch) = batch {
                    write!(f, "?batch={}", batch)?;
                }
                Ok(())
            }
        }
    }
}

/// Open the store named by a connection string
///
/// Unknown schemes fail with `KvError::UnknownProtocol`; engine failures are
/// wrapped in `KvError::Open` with the URI attached.
pub fn open(uri: &str) -> KvResult<Box<dyn KvStore>> {
    let parsed: StoreUri = uri.parse()?;
    parsed.open().map_err(|e| KvError::Open {
        uri: uri.to_string(),
        source: Box::new(e),
    })
}
