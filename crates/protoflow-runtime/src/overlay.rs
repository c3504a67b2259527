//! Configuration handed to toast, modal and action-sheet surfaces

use crate::Action;
use serde::{Deserialize, Serialize};

/// Toast as written in an action or the app's toast registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastSpec {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl ToastSpec {
    /// Fill in defaults; a zero or missing duration takes `default_duration_ms`
    pub fn resolve(&self, default_duration_ms: u64) -> ToastConfig {
        ToastConfig {
            message: self.message.clone(),
            duration: self
                .duration
                .filter(|d| *d > 0)
                .unwrap_or(default_duration_ms),
            kind: self.kind.clone().unwrap_or_else(|| "info".to_string()),
            position: self.position.clone().unwrap_or_else(|| "center".to_string()),
        }
    }
}

/// Fully resolved toast, as presented
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToastConfig {
    pub message: String,
    /// Auto-hide delay in milliseconds
    pub duration: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub closable: bool,
    #[serde(default)]
    pub mask_closable: bool,
    #[serde(default)]
    pub buttons: Vec<ModalButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalButton {
    pub text: String,
    /// `primary`, `secondary` or `danger`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Action the presentation surface dispatches when the button is clicked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_click_action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSheetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<ActionSheetItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSheetItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_defaults() {
        let toast = ToastSpec {
            message: "Saved".into(),
            ..Default::default()
        };
        let resolved = toast.resolve(2000);
        assert_eq!(resolved.duration, 2000);
        assert_eq!(resolved.kind, "info");
        assert_eq!(resolved.position, "center");

        let zero = ToastSpec {
            duration: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.resolve(1500).duration, 1500);
    }

    #[test]
    fn test_modal_from_registry_json() {
        let modal: ModalConfig = serde_json::from_str(
            r#"{"type":"modal","title":"Delete?","content":"Sure","maskClosable":true,
                "buttons":[{"text":"OK","type":"danger","onClickAction":{"type":"hideModal"}}]}"#,
        )
        .unwrap();
        assert_eq!(modal.title, "Delete?");
        assert!(modal.mask_closable);
        assert!(!modal.closable);
        assert_eq!(modal.buttons[0].kind.as_deref(), Some("danger"));
        assert!(modal.buttons[0].on_click_action.is_some());
    }
}
