//! Declarative actions
//!
//! An action is plain data with a `type` discriminator:
//!
//! ```json
//! { "type": "navigateTo", "pageId": "details", "params": { "id": 7 },
//!   "errorAction": { "type": "showToast", "toast": { "message": "Oops" } } }
//! ```
//!
//! Every kind carries `params` and an optional `errorAction`; the remaining
//! fields depend on the kind.

use crate::overlay::{ActionSheetConfig, ModalConfig, ToastSpec};
use crate::{Error, Result};
use indexmap::IndexMap;
use protoflow_core::{Value, ValueMap};
use serde::{Deserialize, Serialize};

/// An action together with the fields shared by every kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub params: ValueMap,
    /// Fallback run when this action fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_action: Option<Box<Action>>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// The closed set of action kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionKind {
    /// Push a page
    NavigateTo { page_id: String },
    /// Replace the current page
    RedirectTo { page_id: String },
    /// Clear the stack and push a page (the initial page when omitted)
    ReLaunch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_id: Option<String>,
    },
    /// Pop `params.depth` pages (default 1)
    NavigateBack,
    /// Select a tab by index or by page id
    SwitchTab {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_id: Option<String>,
    },
    ShowModal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modal: Option<ModalConfig>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modal_id: Option<String>,
    },
    HideModal,
    ShowToast {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        toast: Option<ToastSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        toast_id: Option<String>,
    },
    HideToast,
    ShowActionSheet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_sheet: Option<ActionSheetConfig>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_sheet_id: Option<String>,
    },
    HideActionSheet,
    /// Network call through the transport collaborator
    Request {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        headers: IndexMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success_action: Option<Box<Action>>,
        /// Also write the response into the state tree at this path
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_path: Option<String>,
    },
    /// Write a value into the state tree (slash or dot path)
    UpdateState {
        state_path: String,
        #[serde(default)]
        state_value: Value,
    },
    /// Wait, then run `nextAction`
    Delay {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_action: Option<Box<Action>>,
    },
    /// Any unrecognised `type`
    #[serde(other)]
    Unknown,
}

impl ActionKind {
    /// The `type` discriminator
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::NavigateTo { .. } => "navigateTo",
            ActionKind::RedirectTo { .. } => "redirectTo",
            ActionKind::ReLaunch { .. } => "reLaunch",
            ActionKind::NavigateBack => "navigateBack",
            ActionKind::SwitchTab { .. } => "switchTab",
            ActionKind::ShowModal { .. } => "showModal",
            ActionKind::HideModal => "hideModal",
            ActionKind::ShowToast { .. } => "showToast",
            ActionKind::HideToast => "hideToast",
            ActionKind::ShowActionSheet { .. } => "showActionSheet",
            ActionKind::HideActionSheet => "hideActionSheet",
            ActionKind::Request { .. } => "request",
            ActionKind::UpdateState { .. } => "updateState",
            ActionKind::Delay { .. } => "delay",
            ActionKind::Unknown => "unknown",
        }
    }
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Action::new(kind)
    }
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: ValueMap::new(),
            error_action: None,
        }
    }

    pub fn navigate_to(page_id: impl Into<String>) -> Self {
        Self::new(ActionKind::NavigateTo {
            page_id: page_id.into(),
        })
    }

    pub fn update_state(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ActionKind::UpdateState {
            state_path: path.into(),
            state_value: value.into(),
        })
    }

    pub fn with_params(mut self, params: ValueMap) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_error_action(mut self, action: Action) -> Self {
        self.error_action = Some(Box::new(action));
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Parse an action from a document value
    ///
    /// The value must be an object with a string `type`. Unrecognised types
    /// parse to [`ActionKind::Unknown`] with a warning.
    pub fn from_value(value: &Value) -> Result<Action> {
        let type_name = match value.get("type") {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            _ => return Err(Error::InvalidAction("missing type".to_string())),
        };
        let json = serde_json::to_value(value)?;
        let action: Action = serde_json::from_value(json)
            .map_err(|e| Error::InvalidAction(format!("{}: {}", type_name, e)))?;
        if action.kind == ActionKind::Unknown {
            log::warn!("Unknown action type: {}", type_name);
        }
        Ok(action)
    }

    /// Serialize back into a document value
    pub fn to_value(&self) -> Result<Value> {
        let json = serde_json::to_value(self)?;
        Ok(serde_json::from_value(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Action> {
        let value: Value = serde_json::from_str(json).unwrap();
        Action::from_value(&value)
    }

    #[test]
    fn test_parse_navigate_with_params() {
        let action = parse(r#"{"type":"navigateTo","pageId":"details","params":{"id":7}}"#).unwrap();
        assert_eq!(
            action.kind,
            ActionKind::NavigateTo {
                page_id: "details".into()
            }
        );
        assert_eq!(action.params.get("id"), Some(&Value::Int(7)));
        assert!(action.error_action.is_none());
    }

    #[test]
    fn test_parse_nested_chain() {
        let action = parse(
            r#"{"type":"request","url":"/api/list","successAction":{"type":"delay","duration":300,
                "nextAction":{"type":"hideToast"}},"errorAction":{"type":"showToast","toast":{"message":"x"}}}"#,
        )
        .unwrap();
        let ActionKind::Request {
            method,
            success_action,
            ..
        } = &action.kind
        else {
            panic!("expected request, got {:?}", action.kind);
        };
        assert_eq!(method, "GET");
        let next = success_action.as_ref().unwrap();
        assert_eq!(next.type_name(), "delay");
        assert_eq!(action.error_action.as_ref().unwrap().type_name(), "showToast");
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(matches!(parse(r#"{"pageId":"x"}"#), Err(Error::InvalidAction(_))));
        assert!(matches!(parse(r#"{"type":""}"#), Err(Error::InvalidAction(_))));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        assert!(matches!(parse(r#"{"type":"navigateTo"}"#), Err(Error::InvalidAction(_))));
    }

    #[test]
    fn test_unknown_type_parses() {
        let action = parse(r#"{"type":"teleport","where":"moon"}"#).unwrap();
        assert_eq!(action.kind, ActionKind::Unknown);
    }

    #[test]
    fn test_value_roundtrip() {
        let action = Action::update_state("user.name", "Ada")
            .with_param("source", "form")
            .with_error_action(Action::new(ActionKind::HideToast));
        let value = action.to_value().unwrap();
        assert_eq!(value.get("type"), Some(&Value::from("updateState")));
        assert_eq!(value.get("statePath"), Some(&Value::from("user.name")));
        assert_eq!(Action::from_value(&value).unwrap(), action);
    }
}
