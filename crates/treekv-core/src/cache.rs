//! Byte cache on the local filesystem
//!
//! Caches the result of an expensive fetch (typically an HTTP call) as a
//! file named by the cache key. A validator decides whether an existing file
//! is fresh enough to serve.
//!
//! Cache root: `$<PREFIX>_CACHE` if set, else `~/.cache/<prefix>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Default freshness window for [`FileCache::get_3min`]
pub const THREE_MINUTES: Duration = Duration::from_secs(3 * 60);

/// Decides whether a cached file may be served
pub trait CacheValidator {
    fn is_valid(&self, cache_file: &Path) -> io::Result<bool>;
}

impl<F> CacheValidator for F
where
    F: Fn(&Path) -> io::Result<bool>,
{
    fn is_valid(&self, cache_file: &Path) -> io::Result<bool> {
        self(cache_file)
    }
}

/// Built-in freshness policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve any existing file
    Always,
    /// Always refetch
    Never,
    /// Serve files modified less than this long ago
    Ttl(Duration),
}

impl CacheValidator for Freshness {
    fn is_valid(&self, cache_file: &Path) -> io::Result<bool> {
        let metadata = match fs::metadata(cache_file) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        match self {
            Freshness::Always => Ok(true),
            Freshness::Never => Ok(false),
            Freshness::Ttl(ttl) => {
                let modified = metadata.modified()?;
                Ok(modified + *ttl > SystemTime::now())
            }
        }
    }
}

/// File-backed byte cache
#[derive(Debug, Clone)]
pub struct FileCache {
    /// `None` when no cache location could be determined
    root: Option<PathBuf>,
}

impl FileCache {
    /// Cache rooted at an explicit directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Cache for an application prefix
    ///
    /// Uses `$<PREFIX>_CACHE`, falling back to `~/.cache/<prefix>`. Without
    /// a home directory the cache is disabled and every read goes to the
    /// getter.
    pub fn for_prefix(prefix: &str) -> Self {
        let from_env = std::env::var(format!("{}_CACHE", prefix.to_uppercase()))
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let root = from_env.or_else(|| {
            dirs::home_dir().map(|home| home.join(".cache").join(prefix.to_lowercase()))
        });
        Self { root }
    }

    /// Cache directory, if caching is enabled
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Serve `key` from the cache if `validator` accepts it, else fetch
    ///
    /// A fresh fetch is written back before it is returned. Validator
    /// failures are logged and count as a miss.
    pub fn get<G, V>(&self, key: &str, getter: G, validator: &V) -> Result<Vec<u8>>
    where
        G: FnOnce() -> Result<Vec<u8>>,
        V: CacheValidator + ?Sized,
    {
        let Some(root) = &self.root else {
            return getter();
        };

        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create cache directory {:?}", root))?;
        let cache_file = root.join(key);

        match validator.is_valid(&cache_file) {
            Ok(true) => {
                debug!("'{}' is read from the cache", key);
                return fs::read(&cache_file)
                    .with_context(|| format!("Failed to read cache file {:?}", cache_file));
            }
            Ok(false) => {}
            Err(e) => warn!("Couldn't validate cache file {:?}: {}", cache_file, e),
        }

        let value = getter()?;
        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }
        fs::write(&cache_file, &value)
            .with_context(|| format!("Failed to write cache file {:?}", cache_file))?;
        Ok(value)
    }

    /// Serve `key` if it was cached less than `ttl` ago
    pub fn get_with_ttl<G>(&self, key: &str, getter: G, ttl: Duration) -> Result<Vec<u8>>
    where
        G: FnOnce() -> Result<Vec<u8>>,
    {
        self.get(key, getter, &Freshness::Ttl(ttl))
    }

    /// Serve `key` if it was cached less than three minutes ago
    pub fn get_3min<G>(&self, key: &str, getter: G) -> Result<Vec<u8>>
    where
        G: FnOnce() -> Result<Vec<u8>>,
    {
        self.get_with_ttl(key, getter, THREE_MINUTES)
    }

    /// Always fetch, refreshing the cached copy
    pub fn force_get<G>(&self, key: &str, getter: G) -> Result<Vec<u8>>
    where
        G: FnOnce() -> Result<Vec<u8>>,
    {
        self.get(key, getter, &Freshness::Never)
    }
}
