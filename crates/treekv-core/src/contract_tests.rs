//! Behaviour every backend must share
//!
//! Each scenario runs against a fresh store of every kind, opened through
//! the URI dispatcher the way applications open them.

use std::collections::BTreeSet;
use std::io::Read;

use tempfile::TempDir;

use crate::error::{KvError, KvResult};
use crate::open::open;
use crate::store::{copy, KvStore};

/// Fresh stores of every backend, kept alive with their directories
fn stores() -> Vec<(TempDir, Box<dyn KvStore>)> {
    let uris: [fn(&str) -> String; 4] = [
        |dir| format!("{}/tree", dir),
        |dir| format!("pebble:{}/lsm", dir),
        |dir| format!("sql:{}/kv.db", dir),
        |dir| format!("sql:{}/kv.db?batch=3", dir),
    ];

    uris.iter()
        .map(|uri| {
            let temp_dir = TempDir::new().unwrap();
            let uri = uri(temp_dir.path().to_str().unwrap());
            let store = open(&uri).unwrap();
            (temp_dir, store)
        })
        .collect()
}

fn fill(store: &mut dyn KvStore) {
    for (key, value) in [
        ("key1", "v0"),
        ("dir1/key1", "v1"),
        ("dir1/key2", "v2"),
        ("dir1/dir2/key3", "v3"),
        ("dir10/key9", "v9"),
    ] {
        store.put(key, value.as_bytes()).unwrap();
    }
    store.commit().unwrap();
}

fn set(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[test]
fn test_round_trip() {
    for (_dir, mut store) in stores() {
        store.put("a/b/c", b"\x00binary\xff").unwrap();
        assert_eq!(
            store.get("a/b/c").unwrap(),
            b"\x00binary\xff",
            "backend {}",
            store.backend()
        );

        store.put("a/b/c", b"overwritten").unwrap();
        assert_eq!(store.get("a/b/c").unwrap(), b"overwritten");
        store.close().unwrap();
    }
}

#[test]
fn test_missing_key_is_not_found() {
    for (_dir, store) in stores() {
        let err = store.get("nope/nothing").unwrap_err();
        assert!(err.is_not_found(), "backend {}: {}", store.backend(), err);
        assert!(!store.contains("nope/nothing"));
    }
}

#[test]
fn test_contains_only_leaves() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());
        assert!(store.contains("dir1/key1"));
        assert!(store.contains("key1"));
        assert!(!store.contains("dir1/key3"), "backend {}", store.backend());
    }
}

#[test]
fn test_list_immediate_children() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());

        let found: BTreeSet<String> = store.list("dir1").unwrap().into_iter().collect();
        assert_eq!(
            found,
            set(&["dir1/key1", "dir1/key2", "dir1/dir2"]),
            "backend {}",
            store.backend()
        );

        let root: BTreeSet<String> = store.list("").unwrap().into_iter().collect();
        assert_eq!(root, set(&["key1", "dir1", "dir10"]), "backend {}", store.backend());
    }
}

#[test]
fn test_list_missing_prefix_is_empty() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());
        assert!(store.list("absent").unwrap().is_empty());
    }
}

#[test]
fn test_list_is_duplicate_free() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());
        store.put("dir1/dir2/key4", b"v4").unwrap();
        store.put("dir1/dir2/deeper/key5", b"v5").unwrap();
        store.commit().unwrap();

        let found = store.list("dir1").unwrap();
        let unique: BTreeSet<&String> = found.iter().collect();
        assert_eq!(found.len(), unique.len(), "backend {}", store.backend());
    }
}

#[test]
fn test_leaf_and_prefix_with_same_name_listed_once() {
    for (_dir, mut store) in stores() {
        // a file can't also be a directory
        if store.backend() == "dir" {
            continue;
        }
        store.put("a", b"leaf").unwrap();
        store.put("a/b", b"child").unwrap();
        store.put("a-b", b"sibling").unwrap();
        store.commit().unwrap();

        let mut root = store.list("").unwrap();
        root.sort();
        assert_eq!(root, vec!["a", "a-b"], "backend {}", store.backend());
        assert_eq!(store.list("a").unwrap(), vec!["a/b"]);
    }
}

#[test]
fn test_list_of_leaf_is_empty() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());
        let found = store.list("dir1/key1");
        assert!(
            found.as_ref().is_ok_and(|keys| keys.is_empty()),
            "backend {}: {:?}",
            store.backend(),
            found
        );
    }
}

#[test]
fn test_surrounding_separators_are_ignored() {
    for (_dir, mut store) in stores() {
        store.put("/abs/x", b"v").unwrap();
        store.commit().unwrap();

        assert_eq!(store.get("abs/x").unwrap(), b"v", "backend {}", store.backend());
        assert_eq!(store.get("/abs/x/").unwrap(), b"v");
        assert!(store.contains("abs/x"));
        assert_eq!(store.list("/").unwrap(), vec!["abs"]);
        assert_eq!(store.list("/abs/").unwrap(), vec!["abs/x"]);

        let mut all = BTreeSet::new();
        store
            .iterate_all(&mut |key| {
                all.insert(key.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(all, set(&["abs/x"]));
    }
}

#[test]
fn test_relative_segments_rejected() {
    for (_dir, mut store) in stores() {
        for key in ["a/../b", "../b", "a/./b", "a//b", "", "/"] {
            let err = store.put(key, b"v").unwrap_err();
            assert!(
                matches!(err, KvError::InvalidKey(_)),
                "backend {} key {:?}: {}",
                store.backend(),
                key,
                err
            );
            assert!(!store.contains(key));
        }
        assert!(matches!(store.list(".."), Err(KvError::InvalidKey(_))));
    }
}

#[test]
fn test_iterate_values_visits_leaf_children() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());

        let mut found = BTreeSet::new();
        store
            .iterate_values("dir1", &mut |key, value| {
                found.insert((key.to_string(), value.to_vec()));
                Ok(())
            })
            .unwrap();

        let expected: BTreeSet<(String, Vec<u8>)> = [("dir1/key1", "v1"), ("dir1/key2", "v2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        assert_eq!(found, expected, "backend {}", store.backend());
    }
}

#[test]
fn test_iterate_all_visits_leaves() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());

        let mut found = BTreeSet::new();
        store
            .iterate_all(&mut |key| {
                found.insert(key.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            found,
            set(&["key1", "dir1/key1", "dir1/key2", "dir1/dir2/key3", "dir10/key9"]),
            "backend {}",
            store.backend()
        );
    }
}

#[test]
fn test_iterate_subtree() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());

        let mut found = BTreeSet::new();
        let result = store.iterate_subtree("dir1", &mut |key| {
            found.insert(key.to_string());
            Ok(())
        });

        if store.backend() == "sqlite" {
            assert!(matches!(result, Err(KvError::Unsupported { .. })));
            continue;
        }
        result.unwrap();
        assert_eq!(
            found,
            set(&["dir1/key1", "dir1/key2", "dir1/dir2/key3"]),
            "backend {}",
            store.backend()
        );
    }
}

#[test]
fn test_visitor_error_stops_traversal() {
    for (_dir, mut store) in stores() {
        fill(store.as_mut());

        let mut visited = 0;
        let err = store
            .iterate("dir1", &mut |_| {
                visited += 1;
                Err(KvError::callback("enough"))
            })
            .unwrap_err();
        assert_eq!(visited, 1, "backend {}", store.backend());
        assert_eq!(err.to_string(), "enough");

        let mut visited = 0;
        store
            .iterate_all(&mut |_| {
                visited += 1;
                Err(KvError::callback("enough"))
            })
            .unwrap_err();
        assert_eq!(visited, 1, "backend {}", store.backend());
    }
}

#[test]
fn test_get_or_default_fills_once() {
    for (_dir, mut store) in stores() {
        let mut calls = 0;
        let mut provider = |key: &str| -> KvResult<Vec<u8>> {
            calls += 1;
            Ok(format!("made for {}", key).into_bytes())
        };

        let first = store.get_or_default("lazy/value", &mut provider).unwrap();
        let second = store.get_or_default("lazy/value", &mut provider).unwrap();

        assert_eq!(first, b"made for lazy/value");
        assert_eq!(second, first);
        assert_eq!(calls, 1, "backend {}", store.backend());
        assert_eq!(store.get("lazy/value").unwrap(), first);
    }
}

#[test]
fn test_get_or_default_provider_error_stores_nothing() {
    for (_dir, mut store) in stores() {
        let result = store.get_or_default("lazy/value", &mut |_| {
            Err(KvError::callback("upstream down"))
        });
        assert!(result.is_err());
        assert!(!store.contains("lazy/value"), "backend {}", store.backend());
    }
}

#[test]
fn test_get_reader_streams_value() {
    for (_dir, mut store) in stores() {
        store.put("blob", b"streamed bytes").unwrap();

        let mut buf = String::new();
        store
            .get_reader("blob")
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "streamed bytes", "backend {}", store.backend());
    }
}

#[test]
fn test_close_is_idempotent() {
    for (_dir, mut store) in stores() {
        store.put("k", b"v").unwrap();
        store.close().unwrap();
        store.close().unwrap();
    }
}

#[test]
fn test_copy_between_every_pair() {
    for (_src_dir, mut source) in stores() {
        fill(source.as_mut());

        for (_dst_dir, mut target) in stores() {
            let copied = copy(source.as_ref(), target.as_mut()).unwrap();
            target.commit().unwrap();

            assert_eq!(copied, 5, "{} -> {}", source.backend(), target.backend());
            assert_eq!(target.get("dir1/dir2/key3").unwrap(), b"v3");
            let listed: BTreeSet<String> = target.list("dir1").unwrap().into_iter().collect();
            assert_eq!(listed, set(&["dir1/key1", "dir1/key2", "dir1/dir2"]));
        }
    }
}

#[test]
fn test_reopen_sees_committed_data() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap();

    for uri in [
        format!("{}/tree", base),
        format!("pebble:{}/lsm", base),
        format!("sql:{}/kv.db?batch=100", base),
    ] {
        let mut store = open(&uri).unwrap();
        fill(store.as_mut());
        store.close().unwrap();
        drop(store);

        let store = open(&uri).unwrap();
        assert_eq!(store.get("dir1/key2").unwrap(), b"v2", "uri {}", uri);
    }
}
