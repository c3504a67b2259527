//! Page Manager - bounded navigation stack
//!
//! The stack always has a current entry (the last pushed or replaced one)
//! unless it is empty. Every mutation queues a change event. [`update`]
//! delivers the queued events after the manager's lock is released, so a
//! listener may read the shared manager again. Listeners run in registration
//! order; a panicking listener is logged and skipped.
//!
//! Operations that cannot be carried out (unknown page, popping the last
//! entry, ...) log a warning, return an error and leave the stack untouched.

use crate::app::{AppConfig, Page};
use crate::guard::guarded;
use crate::{Error, Result};
use protoflow_core::ValueMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// A visited page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStackEntry {
    pub page_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub params: ValueMap,
}

impl PageStackEntry {
    fn new(page_id: &str, params: ValueMap) -> Self {
        Self {
            page_id: page_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageChangeKind {
    Push,
    Pop,
    Replace,
    Clear,
}

/// Notification sent to page listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChangeEvent {
    #[serde(rename = "type")]
    pub kind: PageChangeKind,
    /// Resulting page id (empty after a clear)
    pub page_id: String,
    pub params: Option<ValueMap>,
    pub stack_size: usize,
}

/// Listener handle returned by [`PageManager::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type PageListener = Arc<dyn Fn(&PageChangeEvent) + Send + Sync>;

/// Page manager shared between the executor and the host
pub type SharedPages = Arc<Mutex<PageManager>>;

pub struct PageManager {
    app: Arc<AppConfig>,
    stack: Vec<PageStackEntry>,
    current: Option<usize>,
    max_stack_size: usize,
    listeners: Vec<(ListenerId, PageListener)>,
    next_listener: u64,
    pending: Vec<PageChangeEvent>,
}

/// Change events taken out of a manager, with the listeners to receive them
#[must_use = "events are only seen by listeners once delivered"]
pub struct PendingEvents {
    events: Vec<PageChangeEvent>,
    listeners: Vec<PageListener>,
}

impl PendingEvents {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Call every listener with every event, in order
    pub fn deliver(self) {
        for event in &self.events {
            for listener in &self.listeners {
                // Panics are logged by the guard; remaining listeners still run
                let _ = guarded("page listener", || listener(event));
            }
        }
    }
}

impl std::fmt::Debug for PageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageManager")
            .field("stack", &self.stack)
            .field("current", &self.current)
            .field("max_stack_size", &self.max_stack_size)
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl PageManager {
    /// Create a manager and push the app's initial page
    pub fn new(app: Arc<AppConfig>, max_stack_size: usize) -> Self {
        let mut manager = Self {
            app,
            stack: Vec::new(),
            current: None,
            max_stack_size: max_stack_size.max(1),
            listeners: Vec::new(),
            next_listener: 0,
            pending: Vec::new(),
        };
        let initial = manager.app.initial_page_id().to_string();
        // Failure is already logged; the stack simply starts empty
        let _ = manager.push(&initial, ValueMap::new());
        manager
    }

    pub fn shared(self) -> SharedPages {
        Arc::new(Mutex::new(self))
    }

    pub fn app(&self) -> &Arc<AppConfig> {
        &self.app
    }

    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&PageChangeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns whether the listener was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Queue a change event; nothing is queued while no one listens
    fn notify(&mut self, kind: PageChangeKind, page_id: &str, params: Option<ValueMap>) {
        if self.listeners.is_empty() {
            return;
        }
        self.pending.push(PageChangeEvent {
            kind,
            page_id: page_id.to_string(),
            params,
            stack_size: self.stack.len(),
        });
    }

    /// Take the queued events along with a snapshot of the listeners
    pub fn take_events(&mut self) -> PendingEvents {
        PendingEvents {
            events: std::mem::take(&mut self.pending),
            listeners: self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
        }
    }

    fn reject(&self, err: Error) -> Result<()> {
        log::warn!("[PageManager] {}", err);
        Err(err)
    }

    /// Push a page, evicting the oldest entry when at capacity
    pub fn push(&mut self, page_id: &str, params: ValueMap) -> Result<()> {
        if self.find_page(page_id).is_none() {
            return self.reject(Error::PageNotFound(page_id.to_string()));
        }
        if self.stack.len() >= self.max_stack_size {
            self.stack.remove(0);
        }
        self.stack.push(PageStackEntry::new(page_id, params.clone()));
        self.current = Some(self.stack.len() - 1);
        self.notify(PageChangeKind::Push, page_id, Some(params));
        Ok(())
    }

    /// Pop `depth` entries, always keeping at least one
    ///
    /// Returns the number of entries actually popped.
    pub fn pop(&mut self, depth: usize) -> Result<usize> {
        if depth == 0 {
            return Ok(0);
        }
        if self.stack.len() <= 1 {
            self.reject(Error::StackFloor)?;
        }
        let actual = depth.min(self.stack.len() - 1);
        self.stack.truncate(self.stack.len() - actual);
        self.current = Some(self.stack.len() - 1);
        let page_id = self.current_page_id().to_string();
        self.notify(PageChangeKind::Pop, &page_id, None);
        Ok(actual)
    }

    /// Truncate the stack after the first occurrence of `page_id`
    pub fn pop_to(&mut self, page_id: &str) -> Result<()> {
        let Some(index) = self.stack.iter().position(|e| e.page_id == page_id) else {
            return self.reject(Error::PageNotInStack(page_id.to_string()));
        };
        self.stack.truncate(index + 1);
        self.current = Some(index);
        self.notify(PageChangeKind::Pop, page_id, None);
        Ok(())
    }

    /// Overwrite the current entry in place
    pub fn replace(&mut self, page_id: &str, params: ValueMap) -> Result<()> {
        let Some(index) = self.current else {
            return self.reject(Error::EmptyStack);
        };
        if self.find_page(page_id).is_none() {
            return self.reject(Error::PageNotFound(page_id.to_string()));
        }
        self.stack[index] = PageStackEntry::new(page_id, params.clone());
        self.notify(PageChangeKind::Replace, page_id, Some(params));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.current = None;
        self.notify(PageChangeKind::Clear, "", None);
    }

    pub fn current_entry(&self) -> Option<&PageStackEntry> {
        self.current.and_then(|i| self.stack.get(i))
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.current_entry().and_then(|e| self.find_page(&e.page_id))
    }

    /// Current page id, empty when the stack is empty
    pub fn current_page_id(&self) -> &str {
        self.current_entry().map(|e| e.page_id.as_str()).unwrap_or("")
    }

    pub fn current_params(&self) -> Option<&ValueMap> {
        self.current_entry().map(|e| &e.params)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn stack(&self) -> &[PageStackEntry] {
        &self.stack
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn max_stack_size(&self) -> usize {
        self.max_stack_size
    }

    pub fn can_go_back(&self) -> bool {
        self.stack.len() > 1
    }

    pub fn find_page(&self, page_id: &str) -> Option<&Page> {
        self.app.find_page(page_id)
    }

    /// Drop listeners and the stack
    pub fn destroy(&mut self) {
        self.listeners.clear();
        self.pending.clear();
        self.stack.clear();
        self.current = None;
    }
}

/// Lock a shared page manager, recovering from poisoning
pub(crate) fn lock(pages: &SharedPages) -> MutexGuard<'_, PageManager> {
    pages.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mutate a shared page manager, then notify listeners with the lock released
pub fn update<R>(pages: &SharedPages, f: impl FnOnce(&mut PageManager) -> R) -> R {
    let (result, pending) = {
        let mut manager = lock(pages);
        let result = f(&mut manager);
        (result, manager.take_events())
    };
    pending.deliver();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoflow_core::Value;

    fn app() -> Arc<AppConfig> {
        Arc::new(
            AppConfig::from_json_str(
                r#"{"pages":[{"id":"home"},{"id":"list"},{"id":"details"},{"id":"cart"}],
                    "router":{"mode":"stack","initialPageId":"home"}}"#,
            )
            .unwrap(),
        )
    }

    fn ids(pm: &PageManager) -> Vec<&str> {
        pm.stack().iter().map(|e| e.page_id.as_str()).collect()
    }

    fn recorder(pages: &SharedPages) -> Arc<Mutex<Vec<PageChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        lock(pages).add_listener(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[test]
    fn test_init_pushes_initial_page() {
        let pm = PageManager::new(app(), 50);
        assert_eq!(pm.current_page_id(), "home");
        assert_eq!(pm.stack_size(), 1);
        assert_eq!(pm.current_index(), Some(0));
        assert!(!pm.can_go_back());
    }

    #[test]
    fn test_push_then_pop_returns_to_initial() {
        let mut pm = PageManager::new(app(), 50);
        let mut params = ValueMap::new();
        params.insert("id".into(), Value::Int(7));
        pm.push("details", params.clone()).unwrap();
        assert_eq!(pm.current_page_id(), "details");
        assert_eq!(pm.current_params(), Some(&params));
        assert_eq!(pm.pop(1).unwrap(), 1);
        assert_eq!(pm.current_page_id(), "home");
    }

    #[test]
    fn test_push_unknown_page_is_rejected() {
        let pages = PageManager::new(app(), 50).shared();
        let events = recorder(&pages);
        let pushed = update(&pages, |pm| pm.push("nope", ValueMap::new()));
        assert!(matches!(pushed, Err(Error::PageNotFound(_))));
        assert_eq!(ids(&lock(&pages)), vec!["home"]);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pop_floor_and_zero_depth() {
        let mut pm = PageManager::new(app(), 50);
        assert!(matches!(pm.pop(1), Err(Error::StackFloor)));
        assert_eq!(pm.pop(0).unwrap(), 0);
        pm.push("list", ValueMap::new()).unwrap();
        pm.push("details", ValueMap::new()).unwrap();
        assert_eq!(pm.pop(10).unwrap(), 2);
        assert_eq!(ids(&pm), vec!["home"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut pm = PageManager::new(app(), 3);
        for id in ["list", "details", "cart"] {
            pm.push(id, ValueMap::new()).unwrap();
            assert!(pm.stack_size() <= 3);
        }
        assert_eq!(ids(&pm), vec!["list", "details", "cart"]);
        assert_eq!(pm.current_page_id(), "cart");
        assert_eq!(pm.current_index(), Some(2));
    }

    #[test]
    fn test_pop_to_and_replace() {
        let mut pm = PageManager::new(app(), 50);
        pm.push("list", ValueMap::new()).unwrap();
        pm.push("details", ValueMap::new()).unwrap();
        pm.push("list", ValueMap::new()).unwrap();
        pm.pop_to("list").unwrap();
        assert_eq!(ids(&pm), vec!["home", "list"]);
        assert!(matches!(pm.pop_to("cart"), Err(Error::PageNotInStack(_))));

        pm.replace("cart", ValueMap::new()).unwrap();
        assert_eq!(ids(&pm), vec!["home", "cart"]);
        assert!(pm.replace("nope", ValueMap::new()).is_err());

        pm.clear();
        assert_eq!(pm.current_index(), None);
        assert_eq!(pm.current_page_id(), "");
        assert!(matches!(pm.replace("home", ValueMap::new()), Err(Error::EmptyStack)));
    }

    #[test]
    fn test_events_and_listener_isolation() {
        let pages = PageManager::new(app(), 50).shared();
        lock(&pages).add_listener(|_| panic!("faulty listener"));
        let events = recorder(&pages);
        update(&pages, |pm| pm.push("list", ValueMap::new())).unwrap();
        update(&pages, |pm| {
            pm.pop(1).unwrap();
            pm.clear();
        });

        let events = events.lock().unwrap();
        let kinds: Vec<_> = events.iter().map(|e| (e.kind, e.page_id.as_str(), e.stack_size)).collect();
        assert_eq!(
            kinds,
            vec![
                (PageChangeKind::Push, "list", 2),
                (PageChangeKind::Pop, "home", 1),
                (PageChangeKind::Clear, "", 0),
            ]
        );
    }

    #[test]
    fn test_remove_listener_and_destroy() {
        let mut pm = PageManager::new(app(), 50);
        let events = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&events);
        let id = pm.add_listener(move |_| *sink.lock().unwrap() += 1);
        pm.push("list", ValueMap::new()).unwrap();
        pm.take_events().deliver();
        assert!(pm.remove_listener(id));
        assert!(!pm.remove_listener(id));
        pm.push("cart", ValueMap::new()).unwrap();
        assert!(pm.take_events().is_empty());
        assert_eq!(*events.lock().unwrap(), 1);

        pm.destroy();
        assert_eq!(pm.stack_size(), 0);
        assert!(pm.current_page().is_none());
    }

    #[test]
    fn test_listener_can_read_the_manager() {
        let pages = PageManager::new(app(), 50).shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (reader, sink) = (Arc::clone(&pages), Arc::clone(&seen));
        lock(&pages).add_listener(move |_| {
            let current = lock(&reader).current_page_id().to_string();
            sink.lock().unwrap().push(current);
        });
        update(&pages, |pm| pm.push("details", ValueMap::new())).unwrap();
        update(&pages, |pm| pm.replace("cart", ValueMap::new())).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["details".to_string(), "cart".to_string()]);
    }
}
