//! Runtime - composition root for one running app
//!
//! Owns the state store, page manager, evaluator, visibility checker, state
//! watcher and action executor of a single app document, and wires them
//! together:
//!
//! - every state write made by the executor is reported to the watcher
//! - watcher actions are evaluated against the state at notification time and
//!   dispatched one causal level deeper than the write that triggered them
//!
//! Several runtimes can live side by side; nothing here is global.

use crate::action::Action;
use crate::app::AppConfig;
use crate::callbacks::{ActionCallbacks, StateChange, StateObserver};
use crate::config::RuntimeConfig;
use crate::executor::{ActionExecutor, Outcome, WeakExecutor, Wiring};
use crate::page::{self, ListenerId, PageChangeEvent, PageManager, SharedPages};
use crate::store::{self, SharedStore, Store};
use crate::timer::TaskGroup;
use crate::transport::Transport;
use crate::watcher::{self, StateWatcher, WatchContext, WatcherConfig, WatcherTrigger};
use crate::{Error, Result};
use protoflow_core::{EvalContext, Evaluator, Value, VisibilityChecker};
use std::sync::{Arc, Weak};

/// Forwards executor writes to the watcher
struct WatchBridge {
    watcher: StateWatcher,
    store: SharedStore,
}

impl StateObserver for WatchBridge {
    fn state_changed(&self, change: &StateChange) {
        let state = store::read(&self.store).state().clone();
        self.watcher.notify(
            &change.path,
            Some(change.new.clone()),
            change.old.clone(),
            WatchContext {
                state,
                cascade_depth: change.depth,
            },
        );
    }
}

pub struct Runtime {
    config: RuntimeConfig,
    app: Arc<AppConfig>,
    store: SharedStore,
    pages: SharedPages,
    evaluator: Arc<Evaluator>,
    visibility: VisibilityChecker,
    watcher: StateWatcher,
    executor: ActionExecutor,
    tasks: Arc<TaskGroup>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("app", &self.app.id)
            .field("current_page", &self.current_page_id())
            .field("watcher", &self.watcher)
            .finish()
    }
}

impl Runtime {
    /// Boot a runtime with the default computed functions
    pub fn new(app: AppConfig, config: RuntimeConfig) -> Self {
        Self::with_evaluator(app, config, Evaluator::new())
    }

    /// Boot a runtime around a custom evaluator
    ///
    /// Watch declarations found in the app's pages are registered right away;
    /// `immediate` ones need a tokio runtime to dispatch their action.
    pub fn with_evaluator(app: AppConfig, config: RuntimeConfig, evaluator: Evaluator) -> Self {
        let app = Arc::new(app);
        let capacity = app
            .router
            .history_limit
            .map(|limit| limit.max(1))
            .unwrap_or(config.max_stack_size);
        let store = Store::new(&app).shared();
        let pages = PageManager::new(Arc::clone(&app), capacity).shared();
        let evaluator = Arc::new(evaluator);
        let visibility = VisibilityChecker::new(Arc::clone(&evaluator));
        let tasks = Arc::new(TaskGroup::new());
        let executor = ActionExecutor::new(config.clone());

        let watcher = StateWatcher::new(
            Arc::clone(&evaluator),
            watcher_dispatch(executor.downgrade(), Arc::clone(&evaluator), Arc::downgrade(&tasks)),
        );
        let bridge = WatchBridge {
            watcher: watcher.clone(),
            store: Arc::clone(&store),
        };
        executor.init(
            Wiring::new(Arc::clone(&pages), Arc::clone(&store)).with_observer(Arc::new(bridge)),
        );

        let runtime = Self {
            config,
            app,
            store,
            pages,
            evaluator,
            visibility,
            watcher,
            executor,
            tasks,
        };
        runtime.register_declared_watchers();
        log::info!(
            "runtime started for app '{}' on page '{}'",
            runtime.app.id,
            runtime.current_page_id()
        );
        runtime
    }

    fn register_declared_watchers(&self) {
        for declaration in self.app.watch_declarations() {
            match WatcherConfig::from_value(&declaration.config) {
                Ok(config) => {
                    let ctx = WatchContext {
                        state: self.state(),
                        cascade_depth: 0,
                    };
                    self.watcher.add_watcher_with_context(&declaration.path, config, ctx);
                }
                Err(e) => log::warn!(
                    "Ignoring watch on {} in page {}: {}",
                    declaration.path,
                    declaration.page_id,
                    e
                ),
            }
        }
    }

    /// Run an action
    pub async fn dispatch(&self, action: Action) -> Outcome {
        self.executor.execute(action).await
    }

    /// Run an action given as a document value, evaluating its expressions first
    pub async fn dispatch_value(&self, value: &Value) -> Outcome {
        let resolved = self.evaluate(value).unwrap_or(Value::Null);
        self.executor.execute_value(&resolved).await
    }

    /// Write state from outside an action and notify watchers
    pub fn set_state(&self, state_path: &str, value: Value) -> Result<()> {
        let write = store::write(&self.store).set(state_path, value.clone())?;
        let state = self.state();
        self.watcher.notify(
            &write.path,
            Some(value),
            write.old,
            WatchContext {
                state,
                cascade_depth: 0,
            },
        );
        Ok(())
    }

    /// Snapshot of the whole state tree
    pub fn state(&self) -> Value {
        store::read(&self.store).state().clone()
    }

    /// Read a value by slash or dot path
    pub fn get(&self, state_path: &str) -> Option<Value> {
        store::read(&self.store).get(state_path).cloned()
    }

    /// Last response received from `url`
    pub fn request_result(&self, url: &str) -> Option<Value> {
        store::read(&self.store).request_result(url).cloned()
    }

    /// Evaluate an expression against the current state
    pub fn evaluate(&self, expr: &Value) -> Option<Value> {
        let state = self.state();
        self.evaluator.evaluate(expr, &EvalContext::new(&state))
    }

    /// Whether a component node is eligible for rendering right now
    pub fn is_visible(&self, node: &Value) -> bool {
        let state = self.state();
        self.visibility.check_visibility(node, &EvalContext::new(&state))
    }

    pub fn current_page_id(&self) -> String {
        page::lock(&self.pages).current_page_id().to_string()
    }

    /// Component tree of the current page
    pub fn current_page_tree(&self) -> Option<Value> {
        page::lock(&self.pages)
            .current_page()
            .map(|p| p.component_tree.clone())
    }

    /// Read access to the page manager
    pub fn with_pages<R>(&self, f: impl FnOnce(&PageManager) -> R) -> R {
        f(&page::lock(&self.pages))
    }

    pub fn add_page_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PageChangeEvent) + Send + Sync + 'static,
    {
        page::lock(&self.pages).add_listener(listener)
    }

    pub fn remove_page_listener(&self, id: ListenerId) -> bool {
        page::lock(&self.pages).remove_listener(id)
    }

    /// Replace the UI callbacks; returns false after shutdown
    pub fn set_callbacks(&self, callbacks: Arc<dyn ActionCallbacks>) -> bool {
        self.executor.set_callbacks(callbacks)
    }

    /// Replace the transport; returns false after shutdown
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> bool {
        self.executor.set_transport(transport)
    }

    pub fn app(&self) -> &Arc<AppConfig> {
        &self.app
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    pub fn watcher(&self) -> &StateWatcher {
        &self.watcher
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Watcher-triggered actions still in flight
    pub fn pending_tasks(&self) -> usize {
        self.tasks.running()
    }

    /// Cancel every timer and in-flight cascade and make the runtime inert
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.watcher.clear();
        self.executor.destroy();
        self.tasks.abort_all();
        page::update(&self.pages, PageManager::destroy);
        log::debug!("runtime for app '{}' shut down", self.app.id);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The watcher callback: evaluate the watcher's action and dispatch it
fn watcher_dispatch(
    executor: WeakExecutor,
    evaluator: Arc<Evaluator>,
    tasks: Weak<TaskGroup>,
) -> impl Fn(&WatcherTrigger, &WatchContext) -> Result<()> + Send + Sync + 'static {
    move |trigger: &WatcherTrigger, ctx: &WatchContext| {
        let Some(executor) = executor.upgrade() else {
            return Err(Error::Inert);
        };
        let value = match &trigger.watcher.action {
            Value::String(kind) => [("type", Value::from(kind.as_str()))].into_iter().collect(),
            action => {
                let state = watcher::inject(
                    &ctx.state,
                    trigger.new_value.as_ref(),
                    trigger.old_value.as_ref(),
                );
                evaluator
                    .evaluate(action, &EvalContext::new(&state))
                    .unwrap_or(Value::Null)
            }
        };
        let action = Action::from_value(&value)?;
        let depth = ctx.cascade_depth + 1;
        let kind = action.type_name();
        let Some(tasks) = tasks.upgrade() else {
            return Err(Error::Inert);
        };
        let spawned = tasks.spawn(async move {
            executor.dispatch(action, depth).await;
        });
        if !spawned {
            log::warn!("no async runtime, dropping watcher action {} for {}", kind, trigger.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{RecordingCallbacks, UiEvent};
    use std::time::Duration;

    const APP: &str = r#"{
        "id": "shop",
        "pages": [
            {"id": "home", "componentTree": {
                "type": "view",
                "watch": {"/cart/count": {
                    "action": {"type": "showToast", "toast": {"message": {"$template": "${newValue} items"}}},
                    "condition": {"$value": "", "gt": 0}
                }}
            }},
            {"id": "vip", "componentTree": {"type": "view"}}
        ],
        "router": {"initialPageId": "home", "historyLimit": 3},
        "state": {"cart": {"count": 0}, "user": {"premium": false}}
    }"#;

    fn runtime() -> (Runtime, Arc<RecordingCallbacks>) {
        let app = AppConfig::from_json_str(APP).unwrap();
        let rt = Runtime::new(app, RuntimeConfig::default());
        let ui = Arc::new(RecordingCallbacks::new());
        assert!(rt.set_callbacks(ui.clone()));
        (rt, ui)
    }

    #[tokio::test]
    async fn test_declared_watcher_fires_with_evaluated_action() {
        let (rt, ui) = runtime();
        assert_eq!(rt.watcher().watcher_info(), vec![("/cart/count".to_string(), 1)]);

        rt.set_state("cart.count", Value::Int(0)).unwrap();
        rt.set_state("/cart/count", Value::Int(3)).unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let toasts: Vec<_> = ui
            .events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::ShowToast(t) => Some(t.message),
                _ => None,
            })
            .collect();
        assert_eq!(toasts, vec!["3 items".to_string()]);
    }

    #[tokio::test]
    async fn test_history_limit_overrides_capacity() {
        let (rt, _) = runtime();
        for _ in 0..5 {
            rt.dispatch(Action::navigate_to("vip")).await;
        }
        assert_eq!(rt.with_pages(|p| p.stack_size()), 3);
        assert_eq!(rt.current_page_id(), "vip");
    }

    #[tokio::test]
    async fn test_dispatch_value_evaluates_expressions() {
        let (rt, _) = runtime();
        let action: Value = serde_json::from_str(
            r#"{"type":"updateState","statePath":"/copy","stateValue":{"$state":"/user/premium"}}"#,
        )
        .unwrap();
        assert_eq!(rt.dispatch_value(&action).await, Outcome::Completed);
        assert_eq!(rt.get("copy"), Some(Value::Bool(false)));
    }

    #[test]
    fn test_visibility_and_page_tree() {
        let (rt, _) = runtime();
        let node: Value =
            serde_json::from_str(r#"{"visible": {"$state": "/user/premium", "eq": true}}"#).unwrap();
        assert!(!rt.is_visible(&node));
        rt.set_state("user.premium", Value::Bool(true)).unwrap();
        assert!(rt.is_visible(&node));
        let tree = rt.current_page_tree().unwrap();
        assert_eq!(tree.get("type"), Some(&Value::from("view")));
    }

    #[tokio::test]
    async fn test_shutdown_makes_runtime_inert() {
        let (rt, ui) = runtime();
        rt.shutdown();
        assert_eq!(rt.dispatch(Action::navigate_to("vip")).await, Outcome::Skipped);
        assert!(rt.watcher().watcher_info().is_empty());
        assert!(!rt.set_callbacks(ui.clone()));
        assert!(ui.events().is_empty());
        rt.shutdown();
    }
}
