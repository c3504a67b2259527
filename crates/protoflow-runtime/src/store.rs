//! Global state store
//!
//! Owns the state tree and the registry of request results. Shared between the
//! executor (the only writer) and readers behind an `RwLock`; locks are never
//! held across an await point.

use crate::app::AppConfig;
use crate::{Error, Result};
use indexmap::IndexMap;
use protoflow_core::{path, Value};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key of the selected tab index in the state tree
pub const TAB_INDEX_KEY: &str = "tabBarSelectedIndex";

/// Store shared between runtime components
pub type SharedStore = Arc<RwLock<Store>>;

/// Result of a state write
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    /// Canonical leading-slash path
    pub path: String,
    pub old: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    state: Value,
    request_results: IndexMap<String, Value>,
}

impl Store {
    /// Seed the state tree from an app document
    ///
    /// Global defaults (`theme`, `language`, the selected tab) come first and
    /// the document's own `state` is layered on top.
    pub fn new(app: &AppConfig) -> Self {
        let selected = app.tab_bar.as_ref().map(|t| t.selected_index).unwrap_or(0);
        let mut state: Value = [
            ("theme", Value::from("light")),
            ("language", Value::from("zh-CN")),
            (TAB_INDEX_KEY, Value::from(selected)),
        ]
        .into_iter()
        .collect();

        if let (Some(root), Some(initial)) = (state.as_map_mut(), app.state.as_map()) {
            for (key, value) in initial {
                root.insert(key.clone(), value.clone());
            }
        }

        Self {
            state,
            request_results: IndexMap::new(),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Read a value by slash or dot path
    pub fn get(&self, state_path: &str) -> Option<&Value> {
        path::resolve_segments(&self.state, &path::split_state_path(state_path))
    }

    /// Write a value by slash or dot path, creating intermediate maps
    ///
    /// A path with no key (`""`, `"/"`) is rejected; the root is never replaced.
    pub fn set(&mut self, state_path: &str, value: Value) -> Result<StateWrite> {
        let segments = path::split_state_path(state_path);
        if segments.is_empty() {
            return Err(Error::InvalidAction(format!(
                "state path '{}' does not name a key",
                state_path
            )));
        }
        let old = path::assign(&mut self.state, &segments, value)?;
        Ok(StateWrite {
            path: path::canonical(&segments),
            old,
        })
    }

    pub fn tab_index(&self) -> Option<usize> {
        self.state
            .get(TAB_INDEX_KEY)
            .and_then(Value::as_int)
            .and_then(|i| usize::try_from(i).ok())
    }

    pub fn set_request_result(&mut self, url: impl Into<String>, response: Value) {
        self.request_results.insert(url.into(), response);
    }

    pub fn request_result(&self, url: &str) -> Option<&Value> {
        self.request_results.get(url)
    }

    pub fn clear_request_results(&mut self) {
        self.request_results.clear();
    }
}

/// Read-lock a shared store, recovering from poisoning
pub(crate) fn read(store: &SharedStore) -> RwLockReadGuard<'_, Store> {
    store.read().unwrap_or_else(|e| e.into_inner())
}

/// Write-lock a shared store, recovering from poisoning
pub(crate) fn write(store: &SharedStore) -> RwLockWriteGuard<'_, Store> {
    store.write().unwrap_or_else(|e| e.into_inner())
}
