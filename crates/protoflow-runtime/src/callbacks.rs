//! Seams to the presentation layer and to state observers

use crate::overlay::{ActionSheetConfig, ModalConfig, ToastConfig};
use protoflow_core::{Value, ValueMap};
use std::sync::Mutex;

/// UI side of action execution
///
/// Every method has a no-op default, so an implementation only overrides the
/// surfaces it actually presents.
pub trait ActionCallbacks: Send + Sync {
    fn on_navigate(&self, _page_id: &str, _params: &ValueMap) {}
    fn on_navigate_back(&self, _depth: usize) {}
    fn on_switch_tab(&self, _index: usize) {}
    fn on_show_toast(&self, _config: &ToastConfig) {}
    fn on_hide_toast(&self) {}
    fn on_show_modal(&self, _config: &ModalConfig) {}
    fn on_hide_modal(&self) {}
    fn on_show_action_sheet(&self, _config: &ActionSheetConfig) {}
    fn on_hide_action_sheet(&self) {}
    fn on_state_update(&self, _path: &str, _value: &Value) {}
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl ActionCallbacks for NoopCallbacks {}

/// A state tree write, as seen by observers
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Canonical leading-slash path
    pub path: String,
    pub old: Option<Value>,
    pub new: Value,
    /// Causal depth of the action that made the change
    pub depth: u32,
}

/// Receives every state write made by the executor
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, change: &StateChange);
}

/// One presentation callback invocation
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Navigate { page_id: String, params: ValueMap },
    NavigateBack { depth: usize },
    SwitchTab { index: usize },
    ShowToast(ToastConfig),
    HideToast,
    ShowModal(ModalConfig),
    HideModal,
    ShowActionSheet(ActionSheetConfig),
    HideActionSheet,
    StateUpdate { path: String, value: Value },
}

/// Callbacks that record every invocation in order
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: UiEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<UiEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Count recorded events matching `pred`
    pub fn count(&self, pred: impl Fn(&UiEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl ActionCallbacks for RecordingCallbacks {
    fn on_navigate(&self, page_id: &str, params: &ValueMap) {
        self.record(UiEvent::Navigate {
            page_id: page_id.to_string(),
            params: params.clone(),
        });
    }

    fn on_navigate_back(&self, depth: usize) {
        self.record(UiEvent::NavigateBack { depth });
    }

    fn on_switch_tab(&self, index: usize) {
        self.record(UiEvent::SwitchTab { index });
    }

    fn on_show_toast(&self, config: &ToastConfig) {
        self.record(UiEvent::ShowToast(config.clone()));
    }

    fn on_hide_toast(&self) {
        self.record(UiEvent::HideToast);
    }

    fn on_show_modal(&self, config: &ModalConfig) {
        self.record(UiEvent::ShowModal(config.clone()));
    }

    fn on_hide_modal(&self) {
        self.record(UiEvent::HideModal);
    }

    fn on_show_action_sheet(&self, config: &ActionSheetConfig) {
        self.record(UiEvent::ShowActionSheet(config.clone()));
    }

    fn on_hide_action_sheet(&self) {
        self.record(UiEvent::HideActionSheet);
    }

    fn on_state_update(&self, path: &str, value: &Value) {
        self.record(UiEvent::StateUpdate {
            path: path.to_string(),
            value: value.clone(),
        });
    }
}
