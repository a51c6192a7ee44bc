//! Directory-tree backend
//!
//! Every key is a file below the root directory; every prefix is a
//! directory. Listing a prefix is a plain directory read, so both files and
//! subdirectories show up as children.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{KvError, KvResult};
use crate::key::{self, Visitor};
use crate::store::KvStore;

/// Store rooted at a filesystem directory
#[derive(Debug, Clone)]
pub struct FileTreeStore {
    root: PathBuf,
}

impl FileTreeStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> KvResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| KvError::Io {
            path: root.clone(),
            source,
        })?;
        debug!("Opened file tree store at {:?}", root);
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a key or prefix, always below the root
    fn path_of(&self, key: &str) -> KvResult<PathBuf> {
        let key = key::normalize(key)?;
        if key.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(key))
        }
    }

    /// Key of a file below the root, with `/` separators on every platform
    fn key_of(&self, path: &Path) -> KvResult<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| KvError::InvalidKey(format!("{:?} is outside the store", path)))?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect();
        segments
            .map(|segments| segments.join("/"))
            .ok_or_else(|| KvError::InvalidKey(format!("{:?} is not valid UTF-8", relative)))
    }
}

impl KvStore for FileTreeStore {
    fn backend(&self) -> &'static str {
        "dir"
    }

    fn put(&mut self, key: &str, value: &[u8]) -> KvResult<()> {
        let key = key::entry(key)?;
        let path = self.path_of(key)?;
        atomic_write(&path, value).map_err(|e| KvError::from_io(e, path, key))
    }

    fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        let key = key::entry(key)?;
        let path = self.path_of(key)?;
        fs::read(&path).map_err(|e| KvError::from_io(e, path, key))
    }

    fn get_reader(&self, key: &str) -> KvResult<Box<dyn Read + '_>> {
        let key = key::entry(key)?;
        let path = self.path_of(key)?;
        let file = File::open(&path).map_err(|e| KvError::from_io(e, path, key))?;
        Ok(Box::new(file))
    }

    fn contains(&self, key: &str) -> bool {
        let Ok(path) = key::entry(key).and_then(|key| self.path_of(key)) else {
            return false;
        };
        match fs::metadata(path) {
            Ok(metadata) => metadata.is_file(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Could not stat '{}': {}", key, e);
                false
            }
        }
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        let prefix = key::normalize(prefix)?;
        let dir = self.path_of(prefix)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // a missing prefix, or one naming a leaf, has no children
            Err(e) if e.kind() == io::ErrorKind::NotFound || dir.is_file() => return Ok(()),
            Err(e) => return Err(KvError::from_io(e, dir, prefix)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| KvError::from_io(e, dir.clone(), prefix))?;
            let name = entry.file_name();
            let name = name
                .to_str()
                .ok_or_else(|| KvError::InvalidKey(format!("{:?} is not valid UTF-8", name)))?;
            visit(&key::join(prefix, name))?;
        }
        Ok(())
    }

    fn iterate_subtree(&self, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()> {
        let start = self.path_of(prefix)?;

        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e)
                    if e.depth() == 0
                        && e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) =>
                {
                    return Ok(());
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.clone());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                    return Err(KvError::Io { path, source });
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            visit(&self.key_of(entry.path())?)?;
        }
        Ok(())
    }

    fn is_changed(&self, since: DateTime<Utc>, key: &str) -> KvResult<bool> {
        let key = key::entry(key)?;
        let path = self.path_of(key)?;
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(KvError::from_io(e, path, key)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| KvError::from_io(e, path, key))?;
        Ok(DateTime::<Utc>::from(modified) > since)
    }
}

/// Write data to a file atomically
///
/// 1. Create the parent directories
/// 2. Write to a temporary sibling file
/// 3. Rename the temp file to the target path
///
/// Readers never observe a partially written value.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "key has no file name"))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    drop(file);

    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileTreeStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTreeStore::open(temp_dir.path().join("kv")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_put_creates_directories() {
        let (_dir, mut store) = store();
        store.put("a/b/c/file", b"data").unwrap();

        assert!(store.root().join("a").join("b").join("c").is_dir());
        assert_eq!(store.get("a/b/c/file").unwrap(), b"data");
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, mut store) = store();
        store.put("key", b"one").unwrap();
        store.put("key", b"two").unwrap();

        assert_eq!(store.get("key").unwrap(), b"two");
        // no temp files left behind
        assert_eq!(store.list("").unwrap(), vec!["key".to_string()]);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let (_dir, store) = store();
        let err = store.get("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_reader("nope").is_err());
    }

    #[test]
    fn test_directory_is_not_contained() {
        let (_dir, mut store) = store();
        store.put("dir/key", b"v").unwrap();

        assert!(store.contains("dir/key"));
        assert!(!store.contains("dir"));
    }

    #[test]
    fn test_list_missing_prefix_is_empty() {
        let (_dir, store) = store();
        assert!(store.list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_list_of_leaf_is_empty() {
        let (_dir, mut store) = store();
        store.put("dir1/key1", b"v").unwrap();
        assert!(store.list("dir1/key1").unwrap().is_empty());
    }

    #[test]
    fn test_absolute_key_stays_under_root() {
        let (temp_dir, mut store) = store();
        let key = format!("{}/outside.txt", temp_dir.path().display());
        store.put(&key, b"inside").unwrap();

        assert!(!temp_dir.path().join("outside.txt").exists());
        let stored = store.root().join(key.trim_start_matches('/'));
        assert_eq!(fs::read(stored).unwrap(), b"inside");

        let mut keys = Vec::new();
        store
            .iterate_all(&mut |k| {
                keys.push(k.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(keys, vec![key.trim_start_matches('/').to_string()]);
    }

    #[test]
    fn test_parent_segments_rejected() {
        let (temp_dir, mut store) = store();
        let err = store.put("../escape", b"x").unwrap_err();

        assert!(matches!(err, KvError::InvalidKey(_)));
        assert!(!temp_dir.path().join("escape").exists());
        assert!(!store.contains("../kv/escape"));
        assert!(store.list("..").is_err());
    }

    #[test]
    fn test_get_reader_streams_file() {
        let (_dir, mut store) = store();
        store.put("blob", b"streamed").unwrap();

        let mut content = String::new();
        store
            .get_reader("blob")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "streamed");
    }

    #[test]
    fn test_subtree_visits_files_only() {
        let (_dir, mut store) = store();
        store.put("x/1", b"").unwrap();
        store.put("x/y/2", b"").unwrap();
        store.put("x/y/z/3", b"").unwrap();
        store.put("other", b"").unwrap();

        let mut keys = Vec::new();
        store
            .iterate_subtree("x/y", &mut |key| {
                keys.push(key.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(keys, vec!["x/y/2", "x/y/z/3"]);
    }

    #[test]
    fn test_subtree_of_missing_prefix_is_empty() {
        let (_dir, store) = store();
        let mut visited = 0;
        store
            .iterate_subtree("ghost", &mut |_| {
                visited += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_is_changed_uses_modification_time() {
        let (_dir, mut store) = store();
        store.put("stamp", b"v").unwrap();

        let past = Utc::now() - Duration::hours(1);
        let future = Utc::now() + Duration::hours(1);
        assert!(store.is_changed(past, "stamp").unwrap());
        assert!(!store.is_changed(future, "stamp").unwrap());
        assert!(store.is_changed(future, "never-written").unwrap());
    }
}
