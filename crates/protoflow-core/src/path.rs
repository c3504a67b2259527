//! Slash-delimited state paths
//!
//! The state tree is never addressed by native field access: every read and
//! write goes through a path such as `/user/profile/name`. A leading slash is
//! optional, list elements are addressed by decimal position.

use crate::{Error, Result, Value};

/// Split a slash path into its segments
///
/// One leading `/` is ignored; the empty path (and `/`) address the root and
/// yield no segments.
pub fn segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Split a state path that may be slash- or dot-delimited
///
/// Paths containing a `/` are slash paths; anything else is split on `.`.
pub fn split_state_path(path: &str) -> Vec<&str> {
    if path.contains('/') {
        segments(path)
    } else if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Join segments back into the canonical leading-slash form
pub fn canonical<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(seg.as_ref());
    }
    out
}

/// Canonical form of a slash- or dot-delimited state path
pub fn normalize(path: &str) -> String {
    canonical(&split_state_path(path))
}

/// Resolve a slash path against a tree
///
/// Any missing or null intermediate short-circuits to `None`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    resolve_segments(root, &segments(path))
}

/// Resolve pre-split segments against a tree
pub fn resolve_segments<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = root;
    for seg in segments {
        current = child(current, seg.as_ref())?;
    }
    Some(current)
}

/// Look up one segment below a container
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Map(map) => map.get(segment),
        Value::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

/// Write `value` at `segments`, creating intermediate maps as needed
///
/// Intermediates that are missing, null or scalar are replaced by empty maps.
/// List intermediates are walked by index and must already hold that index.
/// Returns the previous value at the leaf, if any.
pub fn assign<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) -> Result<Option<Value>> {
    let Some((leaf, parents)) = segments.split_last() else {
        return Ok(Some(std::mem::replace(root, value)));
    };

    let mut current = root;
    for seg in parents {
        let seg = seg.as_ref();
        if !current.is_container() {
            *current = Value::map();
        }
        current = match current {
            Value::Map(map) => {
                let slot = map.entry(seg.to_string()).or_insert_with(Value::map);
                if !slot.is_container() {
                    *slot = Value::map();
                }
                slot
            }
            Value::List(list) => {
                let len = list.len();
                seg.parse::<usize>()
                    .ok()
                    .and_then(|i| list.get_mut(i))
                    .ok_or_else(|| Error::InvalidPath(format!("index {} out of bounds ({})", seg, len)))?
            }
            _ => unreachable!("intermediate was coerced to a container"),
        };
    }

    let leaf = leaf.as_ref();
    if !current.is_container() {
        *current = Value::map();
    }
    match current {
        Value::Map(map) => Ok(map.insert(leaf.to_string(), value)),
        Value::List(list) => {
            let index = leaf
                .parse::<usize>()
                .map_err(|_| Error::InvalidPath(format!("'{}' is not a list index", leaf)))?;
            if index < list.len() {
                Ok(Some(std::mem::replace(&mut list[index], value)))
            } else if index == list.len() {
                list.push(value);
                Ok(None)
            } else {
                Err(Error::InvalidPath(format!(
                    "index {} out of bounds ({})",
                    index,
                    list.len()
                )))
            }
        }
        _ => unreachable!("leaf parent was coerced to a container"),
    }
}
