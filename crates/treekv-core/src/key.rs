//! Hierarchical key helpers
//!
//! Keys are `/`-separated paths relative to the store root. The root itself
//! is the empty prefix `""`.

use crate::error::{KvError, KvResult};

/// Callback applied to every key produced by a traversal
pub type Visitor<'a> = dyn FnMut(&str) -> KvResult<()> + 'a;

/// Callback applied to every entry produced by a key-and-value traversal
pub type ValueVisitor<'a> = dyn FnMut(&str, &[u8]) -> KvResult<()> + 'a;

/// Parent prefix of a key (`""` for a top-level key)
pub fn parent(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Last segment of a key
pub fn base(key: &str) -> &str {
    key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
}

/// Join a prefix and a child name
pub fn join(prefix: &str, name: &str) -> String {
    let prefix = trim(prefix);
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Strip surrounding separators so `"/dir/"` and `"dir"` name the same prefix
pub fn trim(prefix: &str) -> &str {
    prefix.trim_matches('/')
}

/// Validate a key or prefix, stripping surrounding separators
///
/// Empty, `.` and `..` segments are rejected, so a key always stays inside
/// its store. The root prefix `""` is valid.
pub fn normalize(key: &str) -> KvResult<&str> {
    let key = trim(key);
    if key.is_empty() {
        return Ok(key);
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(KvError::InvalidKey(format!(
            "'{}' has an empty, '.' or '..' segment",
            key
        )));
    }
    Ok(key)
}

/// Like [`normalize`], but the root does not name an entry
pub fn entry(key: &str) -> KvResult<&str> {
    let key = normalize(key)?;
    if key.is_empty() {
        return Err(KvError::InvalidKey("empty key".to_string()));
    }
    Ok(key)
}

/// The string every descendant of `prefix` starts with
///
/// Matching on `dir1/` instead of `dir1` keeps `dir10/x` out of `dir1`.
pub fn descendant_prefix(prefix: &str) -> String {
    let prefix = trim(prefix);
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Every ancestor prefix of a key, nearest first, excluding the root
///
/// `ancestors("a/b/c")` yields `"a/b"` then `"a"`.
pub fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(parent(key)), |current| Some(parent(current)))
        .take_while(|prefix| !prefix.is_empty())
}

/// Visit the immediate children of `prefix` in a sorted stream of keys
///
/// `keys` must be sorted and positioned at the first key `>=` the
/// descendant prefix. Leaf children are visited as they are; deeper keys
/// collapse into their first segment, visited once, and the rest of that
/// subtree is consumed without being visited. A sub-prefix that is also a
/// leaf (`a` next to `a/b`) is visited once. Reading stops at the first key
/// outside `prefix`, so the cost is bounded by the children and the
/// subtrees skipped on the way.
pub fn visit_children<I>(keys: I, prefix: &str, visit: &mut Visitor<'_>) -> KvResult<()>
where
    I: IntoIterator<Item = KvResult<String>>,
{
    let dir = descendant_prefix(prefix);
    let mut skipping: Option<String> = None;
    // Leaves that are string prefixes of the current key. Only these can
    // reappear as a sub-prefix further on (`a`, `a-x`, `a/b`).
    let mut open_leaves: Vec<String> = Vec::new();

    for key in keys {
        let key = key?;
        if !key.starts_with(&dir) {
            break;
        }
        if let Some(subtree) = &skipping {
            if key.starts_with(subtree.as_str()) {
                continue;
            }
            skipping = None;
        }
        while open_leaves
            .last()
            .is_some_and(|leaf| !key.starts_with(leaf.as_str()))
        {
            open_leaves.pop();
        }

        let rest = &key[dir.len()..];
        match rest.split_once('/') {
            None => {
                visit(&key)?;
                open_leaves.push(key);
            }
            Some((segment, _)) => {
                let child = format!("{}{}", dir, segment);
                if !open_leaves.contains(&child) {
                    visit(&child)?;
                }
                skipping = Some(format!("{}/", child));
            }
        }
    }

    Ok(())
}
