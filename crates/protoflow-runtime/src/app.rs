//! The application document
//!
//! Read-only description of pages, routing, tab bar, overlay registries and the
//! initial state tree. Loaded once (from JSON text or from a streamed document)
//! and shared by every runtime component.

use crate::overlay::{ActionSheetConfig, ModalConfig, ToastSpec};
use crate::Result;
use indexmap::IndexMap;
use protoflow_core::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_bar: Option<TabBarConfig>,
    #[serde(default)]
    pub modals: IndexMap<String, ModalConfig>,
    #[serde(default)]
    pub action_sheets: IndexMap<String, ActionSheetConfig>,
    #[serde(default)]
    pub toasts: IndexMap<String, ToastSpec>,
    /// Initial state tree
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Root component node; left uninterpreted for the rendering layer
    #[serde(default)]
    pub component_tree: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// `tab`, `stack` or `modal`
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub initial_page_id: String,
    /// Overrides the runtime's page stack capacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabBarConfig {
    #[serde(default)]
    pub selected_index: usize,
    #[serde(default)]
    pub items: Vec<TabItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabItem {
    #[serde(default)]
    pub title: String,
    pub page_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_icon: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// A `watch` entry found on a component node
#[derive(Debug, Clone, PartialEq)]
pub struct WatchDeclaration {
    pub page_id: String,
    pub path: String,
    pub config: Value,
}

impl AppConfig {
    /// Parse the document from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build from an already parsed document (e.g. a stream compiler result)
    pub fn from_value(value: &Value) -> Result<Self> {
        let json = serde_json::to_value(value)?;
        Ok(serde_json::from_value(json)?)
    }

    pub fn find_page(&self, page_id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == page_id)
    }

    pub fn initial_page_id(&self) -> &str {
        &self.router.initial_page_id
    }

    /// Tab index showing `page_id`
    pub fn tab_index_of(&self, page_id: &str) -> Option<usize> {
        self.tab_bar
            .as_ref()?
            .items
            .iter()
            .position(|item| item.page_id == page_id)
    }

    /// Page shown by tab `index`
    pub fn tab_page_at(&self, index: usize) -> Option<&str> {
        self.tab_bar
            .as_ref()?
            .items
            .get(index)
            .map(|item| item.page_id.as_str())
    }

    /// Every `watch` declaration in every page's component tree
    ///
    /// Nodes are visited depth first through `children` (a list or a single
    /// node) and `items`.
    pub fn watch_declarations(&self) -> Vec<WatchDeclaration> {
        let mut out = Vec::new();
        for page in &self.pages {
            collect_watches(&page.id, &page.component_tree, &mut out);
        }
        out
    }
}

fn collect_watches(page_id: &str, node: &Value, out: &mut Vec<WatchDeclaration>) {
    let Some(map) = node.as_map() else {
        return;
    };
    if let Some(Value::Map(watch)) = map.get("watch") {
        for (path, config) in watch {
            out.push(WatchDeclaration {
                page_id: page_id.to_string(),
                path: path.clone(),
                config: config.clone(),
            });
        }
    }
    for key in ["children", "items"] {
        match map.get(key) {
            Some(Value::List(nodes)) => {
                for child in nodes {
                    collect_watches(page_id, child, out);
                }
            }
            Some(child @ Value::Map(_)) => collect_watches(page_id, child, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"{
        "id": "shop", "name": "Shop", "version": "1.0.0",
        "pages": [
            {"id": "home", "name": "Home", "componentTree": {
                "type": "view",
                "watch": {"/cart/count": {"action": {"type": "showToast", "toast": {"message": "added"}}}},
                "children": [
                    {"type": "list", "items": [
                        {"type": "item", "watch": {"user.premium": {"action": {"type": "hideToast"}, "once": true}}}
                    ]},
                    {"type": "text"}
                ]
            }},
            {"id": "profile", "componentTree": {"type": "view", "children": {"type": "card",
                "watch": {"/user/name": {"action": {"type": "hideModal"}}}}}}
        ],
        "router": {"mode": "tab", "initialPageId": "home", "historyLimit": 10},
        "tabBar": {"type": "tabBar", "selectedIndex": 1, "items": [
            {"title": "Home", "icon": "h", "selectedIcon": "H", "pageId": "home"},
            {"title": "Me", "icon": "m", "selectedIcon": "M", "pageId": "profile"}
        ]},
        "modals": {"confirm": {"type": "modal", "title": "Sure?", "content": "", "buttons": []}},
        "state": {"cart": {"count": 0}}
    }"#;

    #[test]
    fn test_parse_document() {
        let app = AppConfig::from_json_str(APP).unwrap();
        assert_eq!(app.pages.len(), 2);
        assert_eq!(app.initial_page_id(), "home");
        assert_eq!(app.router.history_limit, Some(10));
        assert!(app.find_page("profile").is_some());
        assert!(app.find_page("nope").is_none());
        assert_eq!(app.modals["confirm"].title, "Sure?");
        assert_eq!(app.state.get("cart").and_then(|c| c.get("count")), Some(&Value::Int(0)));
    }

    #[test]
    fn test_tab_lookup() {
        let app = AppConfig::from_json_str(APP).unwrap();
        assert_eq!(app.tab_index_of("profile"), Some(1));
        assert_eq!(app.tab_page_at(0), Some("home"));
        assert_eq!(app.tab_page_at(5), None);
        assert_eq!(app.tab_bar.as_ref().unwrap().selected_index, 1);
    }

    #[test]
    fn test_watch_declarations_walk_children_and_items() {
        let app = AppConfig::from_json_str(APP).unwrap();
        let paths: Vec<_> = app
            .watch_declarations()
            .into_iter()
            .map(|w| (w.page_id, w.path))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("home".to_string(), "/cart/count".to_string()),
                ("home".to_string(), "user.premium".to_string()),
                ("profile".to_string(), "/user/name".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_value_matches_from_str() {
        let value: Value = serde_json::from_str(APP).unwrap();
        let app = AppConfig::from_value(&value).unwrap();
        assert_eq!(app.id, "shop");
        assert_eq!(app.tab_index_of("home"), Some(0));
    }
}
