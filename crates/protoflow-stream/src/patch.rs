//! Structural patches between two versions of a document
//!
//! Paths are JSON-pointer style: `""` is the root, `/pages/0/id` walks maps by
//! key and lists by index. `~1` and `~0` escape `/` and `~` inside keys.

use crate::{Error, Result};
use protoflow_core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Patch operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Move => "move",
            PatchOp::Copy => "copy",
            PatchOp::Test => "test",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl Patch {
    fn new(op: PatchOp, path: impl Into<String>, value: Option<Value>, from: Option<String>) -> Self {
        Self {
            op,
            path: path.into(),
            value,
            from,
        }
    }

    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::new(PatchOp::Add, path, Some(value), None)
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::new(PatchOp::Remove, path, None, None)
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::new(PatchOp::Replace, path, Some(value), None)
    }

    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(PatchOp::Move, path, None, Some(from.into()))
    }

    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(PatchOp::Copy, path, None, Some(from.into()))
    }

    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self::new(PatchOp::Test, path, Some(value), None)
    }

    fn value_or_null(&self) -> Value {
        self.value.clone().unwrap_or_default()
    }

    fn require_from(&self) -> Result<&str> {
        self.from.as_deref().ok_or_else(|| Error::MissingFrom {
            op: self.op.as_str(),
            path: self.path.clone(),
        })
    }
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn child_path(parent: &str, token: &str) -> String {
    format!("{}/{}", parent, escape(token))
}

/// Split a patch path into unescaped tokens (a missing leading `/` is tolerated)
pub fn tokens(path: &str) -> Vec<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').map(unescape).collect()
}

/// Compute the patches that turn `old` into `new`
///
/// Without a baseline the result is a single root `replace`.
pub fn compute_patches(old: Option<&Value>, new: &Value) -> Vec<Patch> {
    let mut patches = Vec::new();
    match old {
        None => patches.push(Patch::replace("", new.clone())),
        Some(old) => diff("", old, new, &mut patches),
    }
    patches
}

fn diff(path: &str, old: &Value, new: &Value, out: &mut Vec<Patch>) {
    match (old, new) {
        (Value::Map(a), Value::Map(b)) => {
            for (key, old_child) in a {
                let child = child_path(path, key);
                match b.get(key) {
                    Some(new_child) => diff(&child, old_child, new_child, out),
                    None => out.push(Patch::remove(child)),
                }
            }
            for (key, new_child) in b {
                if !a.contains_key(key) {
                    out.push(Patch::add(child_path(path, key), new_child.clone()));
                }
            }
        }
        (Value::List(a), Value::List(b)) => {
            let common = a.len().min(b.len());
            for i in 0..common {
                diff(&format!("{}/{}", path, i), &a[i], &b[i], out);
            }
            for (i, item) in b.iter().enumerate().skip(common) {
                out.push(Patch::add(format!("{}/{}", path, i), item.clone()));
            }
            // Highest index first so earlier removals do not shift later ones
            for i in (common..a.len()).rev() {
                out.push(Patch::remove(format!("{}/{}", path, i)));
            }
        }
        _ => {
            if !old.strict_eq(new) {
                out.push(Patch::replace(path, new.clone()));
            }
        }
    }
}

/// Apply patches to a copy of `doc`
///
/// The input is never touched. The first failing patch aborts the whole batch.
pub fn apply_patches(doc: &Value, patches: &[Patch]) -> Result<Value> {
    let mut out = doc.clone();
    for patch in patches {
        apply_patch(&mut out, patch).map_err(|e| {
            log::warn!("Failed to apply patch {} {}: {}", patch.op, patch.path, e);
            e
        })?;
    }
    Ok(out)
}

/// Apply a single patch in place
pub fn apply_patch(doc: &mut Value, patch: &Patch) -> Result<()> {
    match patch.op {
        PatchOp::Add => add(doc, &patch.path, patch.value_or_null()),
        PatchOp::Remove => remove(doc, &patch.path).map(|_| ()),
        PatchOp::Replace => replace(doc, &patch.path, patch.value_or_null()),
        PatchOp::Move => {
            let from = patch.require_from()?;
            let value = remove(doc, from)?;
            add(doc, &patch.path, value)
        }
        PatchOp::Copy => {
            let from = patch.require_from()?;
            let value = get(doc, from)
                .cloned()
                .ok_or_else(|| Error::PathNotFound(from.to_string()))?;
            add(doc, &patch.path, value)
        }
        PatchOp::Test => {
            let expected = patch.value_or_null();
            match get(doc, &patch.path) {
                Some(actual) if actual.strict_eq(&expected) => Ok(()),
                _ => Err(Error::TestFailed {
                    path: patch.path.clone(),
                }),
            }
        }
    }
}

/// Read the value at a patch path
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for token in tokens(path) {
        current = protoflow_core::path::child(current, &token)?;
    }
    Some(current)
}

fn get_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Map(map) => map.get_mut(token.as_str())?,
            Value::List(list) => list.get_mut(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Locate the parent container of `path` plus the final token
fn parent_of<'a>(doc: &'a mut Value, path: &str) -> Result<Option<(&'a mut Value, String)>> {
    let mut tokens = tokens(path);
    let Some(last) = tokens.pop() else {
        return Ok(None);
    };
    let parent = get_mut(doc, &tokens).ok_or_else(|| Error::PathNotFound(path.to_string()))?;
    Ok(Some((parent, last)))
}

fn list_index(token: &str, path: &str) -> Result<usize> {
    token
        .parse::<usize>()
        .map_err(|_| Error::InvalidPath(path.to_string()))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let Some((parent, last)) = parent_of(doc, path)? else {
        *doc = value;
        return Ok(());
    };
    match parent {
        Value::Map(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::List(list) => {
            if last == "-" {
                list.push(value);
                return Ok(());
            }
            let index = list_index(&last, path)?;
            if index > list.len() {
                return Err(Error::PathNotFound(path.to_string()));
            }
            list.insert(index, value);
            Ok(())
        }
        _ => Err(Error::InvalidPath(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value> {
    let Some((parent, last)) = parent_of(doc, path)? else {
        return Err(Error::RootRemoval);
    };
    match parent {
        Value::Map(map) => map
            .shift_remove(last.as_str())
            .ok_or_else(|| Error::PathNotFound(path.to_string())),
        Value::List(list) => {
            let index = list_index(&last, path)?;
            if index >= list.len() {
                return Err(Error::PathNotFound(path.to_string()));
            }
            Ok(list.remove(index))
        }
        _ => Err(Error::InvalidPath(path.to_string())),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let Some((parent, last)) = parent_of(doc, path)? else {
        *doc = value;
        return Ok(());
    };
    match parent {
        Value::Map(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::List(list) => {
            let index = list_index(&last, path)?;
            let slot = list
                .get_mut(index)
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
            *slot = value;
            Ok(())
        }
        _ => Err(Error::InvalidPath(path.to_string())),
    }
}
