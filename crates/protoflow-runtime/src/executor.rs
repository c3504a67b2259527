//! Action Executor - the single place where actions take effect
//!
//! The executor interprets [`Action`]s against its wiring: the page manager,
//! the state store, the UI callbacks and the transport. It owns nothing else
//! besides the toast auto-hide timer.
//!
//! Every dispatch carries a causal depth. Top-level calls run at depth 0;
//! `successAction`, `errorAction` and `nextAction` run one level deeper, and
//! anything past [`RuntimeConfig::max_cascade_depth`] is refused.
//!
//! Failures are sorted at the dispatch boundary:
//! - configuration and stack-discipline errors are logged and the action is
//!   skipped
//! - any other error runs the action's `errorAction` (with `params.error`
//!   set to the message) or is logged

use crate::action::{Action, ActionKind};
use crate::app::AppConfig;
use crate::callbacks::{ActionCallbacks, NoopCallbacks, StateChange, StateObserver};
use crate::config::RuntimeConfig;
use crate::guard::guarded;
use crate::page::{self, SharedPages};
use crate::store::{self, SharedStore, StateWrite, TAB_INDEX_KEY};
use crate::timer::TimerSet;
use crate::transport::{BoxFuture, MockTransport, RequestDescriptor, Transport};
use crate::{Error, Result};
use protoflow_core::Value;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Notify;

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The action took effect
    Completed,
    /// Nothing happened: invalid or unresolvable action, inert executor
    Skipped,
    /// The action failed and its `errorAction` ran
    Recovered,
    /// The action failed and the failure was only logged
    Failed,
}

/// Collaborators the executor acts on
#[derive(Clone)]
pub struct Wiring {
    pub pages: SharedPages,
    pub store: SharedStore,
    pub callbacks: Arc<dyn ActionCallbacks>,
    pub transport: Arc<dyn Transport>,
    pub observer: Option<Arc<dyn StateObserver>>,
}

impl Wiring {
    /// Wiring with no-op callbacks and the mock transport
    pub fn new(pages: SharedPages, store: SharedStore) -> Self {
        Self {
            pages,
            store,
            callbacks: Arc::new(NoopCallbacks),
            transport: Arc::new(MockTransport::new()),
            observer: None,
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn ActionCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn app(&self) -> Arc<AppConfig> {
        Arc::clone(page::lock(&self.pages).app())
    }
}

struct Inner {
    config: RuntimeConfig,
    wiring: RwLock<Option<Wiring>>,
    toast: Mutex<TimerSet<()>>,
    shutdown: Notify,
}

/// Interprets actions; cheap to clone
#[derive(Clone)]
pub struct ActionExecutor {
    inner: Arc<Inner>,
}

/// Non-owning executor handle, for callbacks the executor itself reaches
#[derive(Clone)]
pub struct WeakExecutor(Weak<Inner>);

impl WeakExecutor {
    pub fn upgrade(&self) -> Option<ActionExecutor> {
        self.0.upgrade().map(|inner| ActionExecutor { inner })
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.inner.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ActionExecutor {
    /// Create an inert executor; call [`init`](Self::init) before dispatching
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                wiring: RwLock::new(None),
                toast: Mutex::new(TimerSet::new()),
                shutdown: Notify::new(),
            }),
        }
    }

    pub fn init(&self, wiring: Wiring) {
        *self.inner.wiring.write().unwrap_or_else(|e| e.into_inner()) = Some(wiring);
        log::debug!("action executor initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner
            .wiring
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakExecutor {
        WeakExecutor(Arc::downgrade(&self.inner))
    }

    /// Replace the UI callbacks; returns false while inert
    pub fn set_callbacks(&self, callbacks: Arc<dyn ActionCallbacks>) -> bool {
        self.update_wiring(|w| w.callbacks = callbacks)
    }

    /// Replace the transport; returns false while inert
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> bool {
        self.update_wiring(|w| w.transport = transport)
    }

    fn update_wiring(&self, f: impl FnOnce(&mut Wiring)) -> bool {
        let mut guard = self.inner.wiring.write().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(wiring) => {
                f(wiring);
                true
            }
            None => false,
        }
    }

    fn wiring(&self) -> Option<Wiring> {
        self.inner
            .wiring
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cancel timers and pending delays and drop the wiring
    ///
    /// The executor is inert afterwards until [`init`](Self::init) is called
    /// again.
    pub fn destroy(&self) {
        self.inner.toast.lock().unwrap_or_else(|e| e.into_inner()).cancel_all();
        self.inner.shutdown.notify_waiters();
        self.inner.wiring.write().unwrap_or_else(|e| e.into_inner()).take();
        log::debug!("action executor destroyed");
    }

    /// Run a top-level action
    pub async fn execute(&self, action: Action) -> Outcome {
        self.dispatch(action, 0).await
    }

    /// Parse and run a top-level action given as a document value
    pub async fn execute_value(&self, value: &Value) -> Outcome {
        match Action::from_value(value) {
            Ok(action) => self.execute(action).await,
            Err(e) => {
                log::warn!("Ignoring action: {}", e);
                Outcome::Skipped
            }
        }
    }

    /// Run an action at causal depth `depth`
    pub fn dispatch(&self, action: Action, depth: u32) -> BoxFuture<'static, Outcome> {
        let this = self.clone();
        Box::pin(async move { this.run(action, depth).await })
    }

    async fn run(&self, action: Action, depth: u32) -> Outcome {
        let limit = self.inner.config.max_cascade_depth;
        if depth > limit {
            log::error!(
                "Refusing {}: {}",
                action.type_name(),
                Error::CascadeLimit { depth: limit }
            );
            return Outcome::Failed;
        }
        let Some(wiring) = self.wiring() else {
            log::warn!("Ignoring {}: {}", action.type_name(), Error::Inert);
            return Outcome::Skipped;
        };

        log::debug!("execute {} (depth {})", action.type_name(), depth);
        match self.perform(&wiring, &action, depth).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_configuration() || e.is_stack_discipline() => {
                log::warn!("Skipping {}: {}", action.type_name(), e);
                Outcome::Skipped
            }
            Err(e) => match &action.error_action {
                Some(fallback) => {
                    log::error!("Action {} failed: {}", action.type_name(), e);
                    let fallback = fallback.as_ref().clone().with_param("error", error_message(&e));
                    self.dispatch(fallback, depth + 1).await;
                    Outcome::Recovered
                }
                None => {
                    log::error!("Action {} failed: {}", action.type_name(), e);
                    Outcome::Failed
                }
            },
        }
    }

    async fn perform(&self, w: &Wiring, action: &Action, depth: u32) -> Result<Outcome> {
        let params = &action.params;
        match &action.kind {
            ActionKind::NavigateTo { page_id } => {
                page::update(&w.pages, |pages| pages.push(page_id, params.clone()))?;
                guarded("on_navigate", || w.callbacks.on_navigate(page_id, params))?;
            }

            ActionKind::RedirectTo { page_id } => {
                page::update(&w.pages, |pages| pages.replace(page_id, params.clone()))?;
                guarded("on_navigate", || w.callbacks.on_navigate(page_id, params))?;
            }

            ActionKind::ReLaunch { page_id } => {
                let app = w.app();
                let target = page_id.as_deref().unwrap_or(app.initial_page_id());
                if app.find_page(target).is_none() {
                    return Err(Error::PageNotFound(target.to_string()));
                }
                self.commit(w, TAB_INDEX_KEY, Value::Int(0), depth)?;
                page::update(&w.pages, |pages| {
                    pages.clear();
                    pages.push(target, params.clone())
                })?;
                guarded("on_navigate", || w.callbacks.on_navigate(target, params))?;
            }

            ActionKind::NavigateBack => {
                let requested = params.get("depth").and_then(Value::as_int).unwrap_or(1);
                if requested <= 0 {
                    return Ok(Outcome::Skipped);
                }
                let requested = usize::try_from(requested).unwrap_or(usize::MAX);
                let popped = page::update(&w.pages, |pages| pages.pop(requested))?;
                guarded("on_navigate_back", || w.callbacks.on_navigate_back(popped))?;
            }

            ActionKind::SwitchTab { tab_index, page_id } => {
                let app = w.app();
                let (index, target) = match (tab_index, page_id) {
                    (Some(index), _) => {
                        let target = app
                            .tab_page_at(*index)
                            .ok_or_else(|| Error::TabNotFound(index.to_string()))?;
                        (*index, target.to_string())
                    }
                    (None, Some(page_id)) => {
                        let index = app
                            .tab_index_of(page_id)
                            .ok_or_else(|| Error::TabNotFound(page_id.clone()))?;
                        (index, page_id.clone())
                    }
                    (None, None) => {
                        return Err(Error::InvalidAction(
                            "switchTab needs tabIndex or pageId".to_string(),
                        ))
                    }
                };
                if app.find_page(&target).is_none() {
                    return Err(Error::PageNotFound(target));
                }
                self.commit(w, TAB_INDEX_KEY, Value::from(index), depth)?;
                page::update(&w.pages, |pages| {
                    pages.clear();
                    pages.push(&target, params.clone())
                })?;
                guarded("on_switch_tab", || w.callbacks.on_switch_tab(index))?;
            }

            ActionKind::ShowModal { modal, modal_id } => {
                let config = match (modal, modal_id) {
                    (Some(inline), _) => inline.clone(),
                    (None, Some(id)) => w
                        .app()
                        .modals
                        .get(id)
                        .cloned()
                        .ok_or_else(|| Error::ModalNotFound(id.clone()))?,
                    (None, None) => {
                        return Err(Error::InvalidAction("showModal needs modal or modalId".to_string()))
                    }
                };
                guarded("on_show_modal", || w.callbacks.on_show_modal(&config))?;
            }

            ActionKind::HideModal => {
                guarded("on_hide_modal", || w.callbacks.on_hide_modal())?;
            }

            ActionKind::ShowToast { toast, toast_id } => {
                let spec = match (toast, toast_id) {
                    (Some(inline), _) => inline.clone(),
                    (None, Some(id)) => w
                        .app()
                        .toasts
                        .get(id)
                        .cloned()
                        .ok_or_else(|| Error::ToastNotFound(id.clone()))?,
                    (None, None) => {
                        return Err(Error::InvalidAction("showToast needs toast or toastId".to_string()))
                    }
                };
                let config = spec.resolve(self.inner.config.toast_duration_ms);
                guarded("on_show_toast", || w.callbacks.on_show_toast(&config))?;
                self.arm_toast_hide(Duration::from_millis(config.duration));
            }

            ActionKind::HideToast => {
                self.inner.toast.lock().unwrap_or_else(|e| e.into_inner()).cancel(&());
                guarded("on_hide_toast", || w.callbacks.on_hide_toast())?;
            }

            ActionKind::ShowActionSheet {
                action_sheet,
                action_sheet_id,
            } => {
                let config = match (action_sheet, action_sheet_id) {
                    (Some(inline), _) => inline.clone(),
                    (None, Some(id)) => w
                        .app()
                        .action_sheets
                        .get(id)
                        .cloned()
                        .ok_or_else(|| Error::ActionSheetNotFound(id.clone()))?,
                    (None, None) => {
                        return Err(Error::InvalidAction(
                            "showActionSheet needs actionSheet or actionSheetId".to_string(),
                        ))
                    }
                };
                guarded("on_show_action_sheet", || w.callbacks.on_show_action_sheet(&config))?;
            }

            ActionKind::HideActionSheet => {
                guarded("on_hide_action_sheet", || w.callbacks.on_hide_action_sheet())?;
            }

            ActionKind::Request {
                url,
                method,
                data,
                headers,
                success_action,
                response_path,
            } => {
                let request = RequestDescriptor {
                    url: url.clone(),
                    method: method.clone(),
                    data: data.clone(),
                    headers: headers.clone(),
                };
                let response = w.transport.send(request).await?;
                store::write(&w.store).set_request_result(url.clone(), response.clone());
                if let Some(target) = response_path.as_deref().filter(|p| !p.is_empty()) {
                    self.commit(w, target, response.clone(), depth)?;
                }
                if let Some(next) = success_action {
                    let next = next.as_ref().clone().with_param("response", response);
                    self.dispatch(next, depth + 1).await;
                }
            }

            ActionKind::UpdateState {
                state_path,
                state_value,
            } => {
                if state_path.trim().is_empty() {
                    return Err(Error::InvalidAction("updateState needs statePath".to_string()));
                }
                let write = self.commit(w, state_path, state_value.clone(), depth)?;
                guarded("on_state_update", || {
                    w.callbacks.on_state_update(&write.path, state_value)
                })?;
            }

            ActionKind::Delay {
                duration,
                next_action,
            } => {
                let wait = duration
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.inner.config.delay_duration());
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.inner.shutdown.notified() => {
                        log::debug!("delay cancelled by shutdown");
                        return Ok(Outcome::Skipped);
                    }
                }
                if let Some(next) = next_action {
                    self.dispatch(next.as_ref().clone(), depth + 1).await;
                }
            }

            ActionKind::Unknown => {
                log::debug!("unknown action ignored");
                return Ok(Outcome::Skipped);
            }
        }
        Ok(Outcome::Completed)
    }

    /// Write into the store and tell the observer
    fn commit(&self, w: &Wiring, state_path: &str, value: Value, depth: u32) -> Result<StateWrite> {
        let write = store::write(&w.store).set(state_path, value.clone())?;
        if let Some(observer) = &w.observer {
            let change = StateChange {
                path: write.path.clone(),
                old: write.old.clone(),
                new: value,
                depth,
            };
            // A panicking observer is logged by the guard; the write stands
            let _ = guarded("state observer", || observer.state_changed(&change));
        }
        Ok(write)
    }

    fn arm_toast_hide(&self, after: Duration) {
        let weak = self.downgrade();
        let hide = move || {
            let Some(executor) = weak.upgrade() else {
                return;
            };
            if let Some(wiring) = executor.wiring() {
                let _ = guarded("on_hide_toast", || wiring.callbacks.on_hide_toast());
            }
        };
        let armed = self
            .inner
            .toast
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .schedule((), after, hide);
        if armed.is_err() {
            log::warn!("no async runtime, toast will not auto-hide");
        }
    }
}

fn error_message(err: &Error) -> Value {
    match err {
        Error::Transport(message) => Value::String(message.clone()),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{RecordingCallbacks, UiEvent};
    use crate::page::PageManager;
    use crate::store::Store;
    use protoflow_core::ValueMap;

    const APP: &str = r#"{
        "pages": [{"id": "home"}, {"id": "details"}, {"id": "profile"}],
        "router": {"mode": "tab", "initialPageId": "home"},
        "tabBar": {"selectedIndex": 0, "items": [
            {"title": "Home", "pageId": "home"},
            {"title": "Me", "pageId": "profile"}
        ]},
        "modals": {"confirm": {"title": "Sure?"}},
        "toasts": {"saved": {"message": "Saved", "type": "success"}},
        "actionSheets": {"share": {"items": [{"text": "Copy link"}]}}
    }"#;

    struct Fixture {
        executor: ActionExecutor,
        pages: SharedPages,
        store: SharedStore,
        ui: Arc<RecordingCallbacks>,
        transport: Arc<MockTransport>,
    }

    fn fixture() -> Fixture {
        fixture_with(RuntimeConfig::default())
    }

    fn fixture_with(config: RuntimeConfig) -> Fixture {
        let app = Arc::new(AppConfig::from_json_str(APP).unwrap());
        let pages = PageManager::new(Arc::clone(&app), config.max_stack_size).shared();
        let store = Store::new(&app).shared();
        let ui = Arc::new(RecordingCallbacks::new());
        let transport = Arc::new(MockTransport::new());
        let executor = ActionExecutor::new(config);
        executor.init(
            Wiring::new(Arc::clone(&pages), Arc::clone(&store))
                .with_callbacks(ui.clone())
                .with_transport(transport.clone()),
        );
        Fixture {
            executor,
            pages,
            store,
            ui,
            transport,
        }
    }

    fn action(json: &str) -> Action {
        let value: Value = serde_json::from_str(json).unwrap();
        Action::from_value(&value).unwrap()
    }

    fn current(f: &Fixture) -> String {
        page::lock(&f.pages).current_page_id().to_string()
    }

    fn state(f: &Fixture, p: &str) -> Option<Value> {
        store::read(&f.store).get(p).cloned()
    }

    #[tokio::test]
    async fn test_navigate_to_pushes_and_calls_back() {
        let f = fixture();
        let outcome = f
            .executor
            .execute(action(r#"{"type":"navigateTo","pageId":"details","params":{"id":7}}"#))
            .await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(current(&f), "details");
        assert_eq!(page::lock(&f.pages).stack_size(), 2);
        let events = f.ui.events();
        assert!(matches!(&events[..], [UiEvent::Navigate { page_id, params }]
            if page_id == "details" && params.get("id") == Some(&Value::Int(7))));
    }

    #[tokio::test]
    async fn test_unknown_page_is_skipped_without_callback() {
        let f = fixture();
        let outcome = f
            .executor
            .execute(
                Action::navigate_to("nowhere")
                    .with_error_action(Action::update_state("/handled", true)),
            )
            .await;
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(current(&f), "home");
        assert!(f.ui.events().is_empty());
        assert_eq!(state(&f, "/handled"), None, "configuration errors skip errorAction");
    }

    #[tokio::test]
    async fn test_redirect_and_back() {
        let f = fixture();
        f.executor.execute(Action::navigate_to("details")).await;
        let outcome = f.executor.execute(action(r#"{"type":"redirectTo","pageId":"profile"}"#)).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(page::lock(&f.pages).stack_size(), 2);
        assert_eq!(current(&f), "profile");

        let back = action(r#"{"type":"navigateBack","params":{"depth":5}}"#);
        assert_eq!(f.executor.execute(back.clone()).await, Outcome::Completed);
        assert_eq!(current(&f), "home");
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::NavigateBack { depth: 1 })), 1);

        assert_eq!(f.executor.execute(back).await, Outcome::Skipped, "stack floor");
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::NavigateBack { .. })), 1);
    }

    #[tokio::test]
    async fn test_relaunch_resets_stack_and_tab() {
        let f = fixture();
        f.executor.execute(action(r#"{"type":"switchTab","tabIndex":1}"#)).await;
        f.executor.execute(Action::navigate_to("details")).await;
        assert_eq!(state(&f, TAB_INDEX_KEY), Some(Value::Int(1)));

        let outcome = f.executor.execute(action(r#"{"type":"reLaunch"}"#)).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(current(&f), "home");
        assert_eq!(page::lock(&f.pages).stack_size(), 1);
        assert_eq!(state(&f, TAB_INDEX_KEY), Some(Value::Int(0)));

        let missing = f.executor.execute(action(r#"{"type":"reLaunch","pageId":"gone"}"#)).await;
        assert_eq!(missing, Outcome::Skipped);
        assert_eq!(current(&f), "home");
    }

    #[tokio::test]
    async fn test_switch_tab_by_page_id() {
        let f = fixture();
        f.executor.execute(Action::navigate_to("details")).await;
        let outcome = f.executor.execute(action(r#"{"type":"switchTab","pageId":"profile"}"#)).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(current(&f), "profile");
        assert_eq!(page::lock(&f.pages).stack_size(), 1);
        assert_eq!(state(&f, TAB_INDEX_KEY), Some(Value::Int(1)));
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::SwitchTab { index: 1 })), 1);

        let bad = f.executor.execute(action(r#"{"type":"switchTab","tabIndex":9}"#)).await;
        assert_eq!(bad, Outcome::Skipped);
        let neither = f.executor.execute(action(r#"{"type":"switchTab"}"#)).await;
        assert_eq!(neither, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_overlays_by_id_and_inline() {
        let f = fixture();
        let e = &f.executor;
        assert_eq!(e.execute(action(r#"{"type":"showModal","modalId":"confirm"}"#)).await, Outcome::Completed);
        assert_eq!(e.execute(action(r#"{"type":"showModal","modalId":"nope"}"#)).await, Outcome::Skipped);
        e.execute(action(r#"{"type":"hideModal"}"#)).await;
        e.execute(action(r#"{"type":"showActionSheet","actionSheetId":"share"}"#)).await;
        e.execute(action(r#"{"type":"showActionSheet","actionSheet":{"items":[{"text":"Delete","color":"red"}]}}"#))
            .await;
        e.execute(action(r#"{"type":"hideActionSheet"}"#)).await;

        let events = f.ui.events();
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], UiEvent::ShowModal(m) if m.title == "Sure?"));
        assert!(matches!(&events[1], UiEvent::HideModal));
        assert!(matches!(&events[2], UiEvent::ShowActionSheet(s) if s.items[0].text == "Copy link"));
        assert!(matches!(&events[3], UiEvent::ShowActionSheet(s) if s.items[0].text == "Delete"));
        assert!(matches!(&events[4], UiEvent::HideActionSheet));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_defaults_and_auto_hide() {
        let f = fixture();
        f.executor.execute(action(r#"{"type":"showToast","toastId":"saved"}"#)).await;
        let shown = f.ui.events();
        assert!(matches!(&shown[0], UiEvent::ShowToast(t)
            if t.kind == "success" && t.position == "center" && t.duration == 2000));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::HideToast)), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::HideToast)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_toast_cancels_previous_hide() {
        let f = fixture();
        let toast = action(r#"{"type":"showToast","toast":{"message":"hi","duration":1000}}"#);
        f.executor.execute(toast.clone()).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        f.executor.execute(toast).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::HideToast)), 0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::HideToast)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_success_chain() {
        let f = fixture();
        let outcome = f
            .executor
            .execute(action(
                r#"{"type":"request","url":"/api/user/info","responsePath":"user.info",
                    "successAction":{"type":"showToast","toast":{"message":"loaded"}}}"#,
            ))
            .await;
        assert_eq!(outcome, Outcome::Completed);
        let stored = store::read(&f.store).request_result("/api/user/info").cloned();
        assert!(stored.is_some());
        assert_eq!(state(&f, "/user/info/data/name"), Some(Value::from("测试用户")));
        assert_eq!(f.ui.count(|e| matches!(e, UiEvent::ShowToast(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_action_receives_response() {
        let f = fixture();
        f.transport.respond("/api/count", Value::Int(3));
        f.executor
            .execute(action(
                r#"{"type":"request","url":"/api/count","method":"POST",
                    "successAction":{"type":"updateState","statePath":"seen","stateValue":true}}"#,
            ))
            .await;
        assert_eq!(state(&f, "seen"), Some(Value::Bool(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_failure_routes_to_error_action() {
        let f = fixture();
        f.transport.fail("/api/list", "offline");
        let failing = action(
            r#"{"type":"request","url":"/api/list",
                "errorAction":{"type":"showToast","toast":{"message":"failed","type":"error"}}}"#,
        );
        assert_eq!(f.executor.execute(failing).await, Outcome::Recovered);
        assert!(matches!(&f.ui.events()[0], UiEvent::ShowToast(t) if t.kind == "error"));

        let bare = action(r#"{"type":"request","url":"/api/list"}"#);
        assert_eq!(f.executor.execute(bare).await, Outcome::Failed);
        assert!(store::read(&f.store).request_result("/api/list").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_runs_next_action_after_duration() {
        let f = fixture();
        let executor = f.executor.clone();
        let handle = tokio::spawn(async move {
            executor
                .execute(action(
                    r#"{"type":"delay","duration":300,"nextAction":{"type":"updateState","statePath":"/done","stateValue":1}}"#,
                ))
                .await
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(state(&f, "/done"), None);
        assert_eq!(handle.await.unwrap(), Outcome::Completed);
        assert_eq!(state(&f, "/done"), Some(Value::Int(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_delay_and_goes_inert() {
        let f = fixture();
        let executor = f.executor.clone();
        let handle = tokio::spawn(async move {
            executor
                .execute(action(
                    r#"{"type":"delay","nextAction":{"type":"updateState","statePath":"/done","stateValue":1}}"#,
                ))
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.executor.destroy();
        assert_eq!(handle.await.unwrap(), Outcome::Skipped);
        assert_eq!(state(&f, "/done"), None);
        assert!(!f.executor.is_initialized());
        assert_eq!(f.executor.execute(Action::navigate_to("details")).await, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_update_state_calls_back_with_canonical_path() {
        let f = fixture();
        let outcome = f.executor.execute(Action::update_state("user.profile.name", "Ada")).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(state(&f, "/user/profile/name"), Some(Value::from("Ada")));
        assert!(matches!(&f.ui.events()[0], UiEvent::StateUpdate { path, .. } if path == "/user/profile/name"));

        assert_eq!(f.executor.execute(Action::update_state("", 1)).await, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_update_state_at_root_path_is_skipped() {
        let f = fixture();
        let outcome = f
            .executor
            .execute(Action::update_state("/", 5).with_error_action(Action::update_state("/handled", true)))
            .await;
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(state(&f, "theme"), Some(Value::from("light")));
        assert_eq!(state(&f, "/handled"), None);
        assert!(f.ui.events().is_empty());
    }

    #[tokio::test]
    async fn test_cascade_limit_is_a_hard_failure() {
        let f = fixture_with(RuntimeConfig::default().with_max_cascade_depth(2));
        let outcome = f
            .executor
            .dispatch(
                Action::update_state("/x", 1).with_error_action(Action::update_state("/y", 1)),
                3,
            )
            .await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(state(&f, "/x"), None);
        assert_eq!(state(&f, "/y"), None);
    }

    #[tokio::test]
    async fn test_unknown_kind_and_untyped_value() {
        let f = fixture();
        let unknown: Value = serde_json::from_str(r#"{"type":"teleport"}"#).unwrap();
        assert_eq!(f.executor.execute_value(&unknown).await, Outcome::Skipped);
        let untyped: Value = serde_json::from_str(r#"{"pageId":"details"}"#).unwrap();
        assert_eq!(f.executor.execute_value(&untyped).await, Outcome::Skipped);
        assert_eq!(current(&f), "home");
    }

    struct Exploding;

    impl ActionCallbacks for Exploding {
        fn on_navigate(&self, _page_id: &str, _params: &ValueMap) {
            panic!("renderer crashed");
        }
    }

    #[tokio::test]
    async fn test_callback_panic_runs_error_action() {
        let f = fixture();
        assert!(f.executor.set_callbacks(Arc::new(Exploding)));
        let outcome = f
            .executor
            .execute(Action::navigate_to("details").with_error_action(Action::update_state("/crash", true)))
            .await;
        assert_eq!(outcome, Outcome::Recovered);
        assert_eq!(state(&f, "/crash"), Some(Value::Bool(true)));
    }
}
