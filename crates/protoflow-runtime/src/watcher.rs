//! State Watcher - run actions when state paths change
//!
//! Watchers are registered per path, usually from `watch` blocks in the app
//! document:
//!
//! ```json
//! "watch": {
//!   "/user/premium": { "action": { "type": "navigateTo", "pageId": "vip" }, "once": true },
//!   "/cart/*":       { "action": { "type": "showToast", "toast": { "message": "updated" } },
//!                      "debounce": 300 }
//! }
//! ```
//!
//! A `*` segment matches any single segment of a notified path of the same
//! length. Debounce and throttle state is keyed by (watcher path, action type),
//! so unrelated watchers never hold each other back.

use crate::guard::guarded;
use crate::timer::TimerSet;
use crate::Result;
use indexmap::IndexMap;
use protoflow_core::compare::{self, Comparison};
use protoflow_core::{path, EvalContext, Evaluator, Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// One registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    /// Action to run; may contain expressions, evaluated when fired
    pub action: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    /// Quiet period in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<u64>,
    /// Cooldown in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<u64>,
    /// Fire once at registration time
    #[serde(default)]
    pub immediate: bool,
    /// Never fire again after the first time
    #[serde(default)]
    pub once: bool,
}

impl WatcherConfig {
    pub fn new(action: Value) -> Self {
        Self {
            action,
            condition: None,
            debounce: None,
            throttle: None,
            immediate: false,
            once: false,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let json = serde_json::to_value(value)?;
        Ok(serde_json::from_value(json)?)
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce = Some(ms);
        self
    }

    pub fn with_throttle(mut self, ms: u64) -> Self {
        self.throttle = Some(ms);
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// The action's `type` (a bare string action is its own type)
    pub fn action_kind(&self) -> &str {
        match &self.action {
            Value::String(kind) => kind,
            other => other.get("type").and_then(Value::as_str).unwrap_or("unknown"),
        }
    }

    fn debounce_delay(&self) -> Option<Duration> {
        self.debounce.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    fn throttle_window(&self) -> Option<Duration> {
        self.throttle.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

/// What the execution callback receives when a watcher fires
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherTrigger {
    /// The notified path (not the watcher's pattern)
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub watcher: WatcherConfig,
}

/// Evaluation context passed along with a notification
#[derive(Debug, Clone, Default)]
pub struct WatchContext {
    /// State snapshot taken when the change was made
    pub state: Value,
    /// Causal depth of the change
    pub cascade_depth: u32,
}

pub type WatcherCallback = Arc<dyn Fn(&WatcherTrigger, &WatchContext) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TriggerKey {
    path: String,
    action: String,
}

impl TriggerKey {
    fn new(path: &str, watcher: &WatcherConfig) -> Self {
        Self {
            path: path.to_string(),
            action: watcher.action_kind().to_string(),
        }
    }
}

#[derive(Default)]
struct Inner {
    watchers: IndexMap<String, Vec<WatcherConfig>>,
    debounce: TimerSet<TriggerKey>,
    last_fired: HashMap<TriggerKey, Instant>,
    once_fired: HashSet<TriggerKey>,
}

/// Watches state paths and fires a callback for matching registrations
///
/// Cheap to clone; clones share registrations and timers.
#[derive(Clone)]
pub struct StateWatcher {
    inner: Arc<Mutex<Inner>>,
    evaluator: Arc<Evaluator>,
    callback: WatcherCallback,
}

impl std::fmt::Debug for StateWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateWatcher")
            .field("watchers", &self.watcher_info())
            .finish()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl StateWatcher {
    pub fn new<F>(evaluator: Arc<Evaluator>, callback: F) -> Self
    where
        F: Fn(&WatcherTrigger, &WatchContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            evaluator,
            callback: Arc::new(callback),
        }
    }

    /// Register a watcher; `immediate` watchers fire right away
    pub fn add_watcher(&self, watch_path: &str, config: WatcherConfig) {
        self.add_watcher_with_context(watch_path, config, WatchContext::default());
    }

    /// Register a watcher, firing `immediate` ones with `ctx`
    pub fn add_watcher_with_context(&self, watch_path: &str, config: WatcherConfig, ctx: WatchContext) {
        let watch_path = path::normalize(watch_path);
        log::debug!("watching {} ({})", watch_path, config.action_kind());
        let immediate = config.immediate;
        lock(&self.inner)
            .watchers
            .entry(watch_path.clone())
            .or_default()
            .push(config.clone());

        if immediate {
            let key = TriggerKey::new(&watch_path, &config);
            let trigger = WatcherTrigger {
                path: watch_path,
                old_value: None,
                new_value: None,
                watcher: config,
            };
            fire(&self.inner, &self.callback, key, &trigger, &ctx);
        }
    }

    /// Remove one registration (by equality) or every registration of a path
    ///
    /// Returns the number of registrations removed.
    pub fn remove_watcher(&self, watch_path: &str, config: Option<&WatcherConfig>) -> usize {
        let watch_path = path::normalize(watch_path);
        let mut inner = lock(&self.inner);
        let Some(list) = inner.watchers.get_mut(&watch_path) else {
            return 0;
        };
        match config {
            None => {
                let removed = list.len();
                inner.watchers.shift_remove(&watch_path);
                inner.debounce.cancel_where(|k| k.path == watch_path);
                removed
            }
            Some(config) => {
                let Some(index) = list.iter().position(|w| w == config) else {
                    return 0;
                };
                list.remove(index);
                if list.is_empty() {
                    inner.watchers.shift_remove(&watch_path);
                }
                inner.debounce.cancel(&TriggerKey::new(&watch_path, config));
                1
            }
        }
    }

    /// Report a change at `changed_path`
    ///
    /// Callback failures are logged, never returned.
    pub fn notify(
        &self,
        changed_path: &str,
        new_value: Option<Value>,
        old_value: Option<Value>,
        ctx: WatchContext,
    ) {
        let changed_path = path::normalize(changed_path);
        let matched = self.matched_watchers(&changed_path);
        if matched.is_empty() {
            return;
        }

        for (watch_path, watcher) in matched {
            let key = TriggerKey::new(&watch_path, &watcher);

            if watcher.once && lock(&self.inner).once_fired.contains(&key) {
                continue;
            }
            if let Some(condition) = &watcher.condition {
                if !self.check_condition(condition, new_value.as_ref(), old_value.as_ref(), &ctx) {
                    continue;
                }
            }

            let trigger = WatcherTrigger {
                path: changed_path.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                watcher: watcher.clone(),
            };

            if let Some(delay) = watcher.debounce_delay() {
                self.debounce(key, delay, trigger, ctx.clone());
            } else if let Some(window) = watcher.throttle_window() {
                let now = Instant::now();
                let allowed = {
                    let mut inner = lock(&self.inner);
                    let open = inner
                        .last_fired
                        .get(&key)
                        .map(|last| now.duration_since(*last) >= window)
                        .unwrap_or(true);
                    if open {
                        inner.last_fired.insert(key.clone(), now);
                    }
                    open
                };
                if allowed {
                    fire(&self.inner, &self.callback, key, &trigger, &ctx);
                } else {
                    log::trace!("throttled watcher {} for {}", watch_path, changed_path);
                }
            } else {
                fire(&self.inner, &self.callback, key, &trigger, &ctx);
            }
        }
    }

    fn debounce(&self, key: TriggerKey, delay: Duration, trigger: WatcherTrigger, ctx: WatchContext) {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let callback = Arc::clone(&self.callback);
        let timer_key = key.clone();
        let task = move || {
            if let Some(inner) = weak.upgrade() {
                fire(&inner, &callback, key, &trigger, &ctx);
            }
        };
        let scheduled = lock(&self.inner).debounce.schedule(timer_key, delay, task);
        if let Err(task) = scheduled {
            log::warn!("no async runtime for debounced watcher, firing immediately");
            task();
        }
    }

    /// Exact registrations first, then wildcard patterns, each in registration order
    fn matched_watchers(&self, changed_path: &str) -> Vec<(String, WatcherConfig)> {
        let inner = lock(&self.inner);
        let mut out = Vec::new();
        if let Some(list) = inner.watchers.get(changed_path) {
            out.extend(list.iter().map(|w| (changed_path.to_string(), w.clone())));
        }
        let changed: Vec<&str> = path::segments(changed_path);
        for (pattern, list) in &inner.watchers {
            if pattern == changed_path || !pattern.contains('*') {
                continue;
            }
            let parts = path::segments(pattern);
            let matches = parts.len() == changed.len()
                && parts.iter().zip(&changed).all(|(p, c)| *p == "*" || p == c);
            if matches {
                out.extend(list.iter().map(|w| (pattern.clone(), w.clone())));
            }
        }
        out
    }

    /// Evaluate a watcher condition
    ///
    /// `$value` / `$oldValue` select (a sub-path of) the new / old value,
    /// `$state` resolves against the injected state; any other condition is
    /// evaluated as an expression. The injected state is the context state
    /// plus `newValue`, `oldValue` and `value`.
    fn check_condition(
        &self,
        condition: &Value,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
        ctx: &WatchContext,
    ) -> bool {
        let state = inject(&ctx.state, new_value, old_value);
        let eval_ctx = EvalContext::new(&state);

        let Some(map) = condition.as_map() else {
            return self
                .evaluator
                .evaluate(condition, &eval_ctx)
                .map(|v| v.is_truthy())
                .unwrap_or(false);
        };

        let subject = if let Some(selector) = map.get("$value") {
            self.select(selector, new_value, &eval_ctx)
        } else if let Some(selector) = map.get("$oldValue") {
            self.select(selector, old_value, &eval_ctx)
        } else if let Some(state_path) = map.get("$state") {
            match state_path.as_str() {
                Some(p) => self.evaluator.resolve(&eval_ctx, p).cloned(),
                None => None,
            }
        } else {
            return self
                .evaluator
                .evaluate(condition, &eval_ctx)
                .map(|v| v.is_truthy())
                .unwrap_or(false);
        };

        compare_subject(map, subject.as_ref())
    }

    fn select(&self, selector: &Value, base: Option<&Value>, ctx: &EvalContext) -> Option<Value> {
        match selector {
            Value::String(sub) if sub.is_empty() => base.cloned(),
            Value::String(sub) => base.and_then(|b| path::resolve(b, sub)).cloned(),
            Value::Map(_) | Value::List(_) => self.evaluator.evaluate(selector, ctx),
            _ => base.cloned(),
        }
    }

    /// Drop every registration and cancel every timer
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.watchers.clear();
        inner.debounce.cancel_all();
        inner.last_fired.clear();
        inner.once_fired.clear();
    }

    /// Drop the registrations of one path and cancel its timers
    pub fn clear_path(&self, watch_path: &str) {
        let watch_path = path::normalize(watch_path);
        let mut inner = lock(&self.inner);
        inner.watchers.shift_remove(&watch_path);
        inner.debounce.cancel_where(|k| k.path == watch_path);
        inner.last_fired.retain(|k, _| k.path != watch_path);
        inner.once_fired.retain(|k| k.path != watch_path);
    }

    /// `(path, registration count)` per watched path
    pub fn watcher_info(&self) -> Vec<(String, usize)> {
        lock(&self.inner)
            .watchers
            .iter()
            .map(|(p, list)| (p.clone(), list.len()))
            .collect()
    }

    /// Debounce timers that have yet to fire
    pub fn pending_timers(&self) -> usize {
        lock(&self.inner).debounce.pending()
    }
}

fn compare_subject(condition: &ValueMap, subject: Option<&Value>) -> bool {
    if let Some(cmp) = Comparison::from_map(condition) {
        return cmp.holds(subject);
    }
    if let Some(expected) = condition.get("exists") {
        let present = subject.map(|v| !v.is_null()).unwrap_or(false);
        return if expected.as_bool() == Some(false) {
            !present
        } else {
            present
        };
    }
    compare::check(subject, None)
}

/// The context state with `newValue`, `oldValue` and `value` layered on top
pub(crate) fn inject(state: &Value, new_value: Option<&Value>, old_value: Option<&Value>) -> Value {
    let mut map = state.as_map().cloned().unwrap_or_default();
    if let Some(v) = new_value {
        map.insert("newValue".to_string(), v.clone());
        map.insert("value".to_string(), v.clone());
    }
    if let Some(v) = old_value {
        map.insert("oldValue".to_string(), v.clone());
    }
    Value::Map(map)
}

/// Mark `once` bookkeeping and invoke the callback outside the lock
fn fire(
    inner: &Mutex<Inner>,
    callback: &WatcherCallback,
    key: TriggerKey,
    trigger: &WatcherTrigger,
    ctx: &WatchContext,
) {
    if trigger.watcher.once && !lock(inner).once_fired.insert(key) {
        return;
    }
    match guarded("watcher callback", || callback(trigger, ctx)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Error executing watcher for {}: {}", trigger.path, e),
        Err(_) => {}
    }
}
