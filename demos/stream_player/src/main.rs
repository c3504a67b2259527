//! Stream Player Example
//!
//! Streams an app document through the `SpecStreamCompiler` in small chunks,
//! boots a `Runtime` on the completed document and replays a scripted list of
//! actions, printing every callback the presentation layer would receive.
//!
//! Usage:
//!
//! ```text
//! stream_player [app.json] [runtime.ron]
//! ```
//!
//! Set `CHUNK_SIZE` to change how many characters arrive per push (default 48).

use protoflow_core::{Value, ValueMap};
use protoflow_runtime::overlay::{ActionSheetConfig, ModalConfig, ToastConfig};
use protoflow_runtime::{logging, ActionCallbacks, AppConfig, Runtime, RuntimeConfig};
use protoflow_stream::SpecStreamCompiler;
use std::sync::Arc;
use std::time::Duration;

const DEMO_APP: &str = r#"{
    "id": "demo-shop",
    "name": "Demo Shop",
    "version": "1.0.0",
    "pages": [
        {"id": "home", "name": "Home", "componentTree": {
            "type": "view",
            "children": [
                {"type": "text", "props": {"text": {"$template": "Hello ${/user/name}"}}},
                {"type": "badge", "visible": {"$state": "/cart/count", "gt": 0},
                 "watch": {"/cart/count": {
                    "action": {"type": "showToast",
                               "toast": {"message": {"$template": "${/newValue} item(s) in cart"}, "duration": 800}},
                    "debounce": 200
                 }}}
            ]
        }},
        {"id": "details", "name": "Details", "componentTree": {"type": "view"}},
        {"id": "profile", "name": "Profile", "componentTree": {"type": "view"}}
    ],
    "router": {"mode": "tab", "initialPageId": "home"},
    "tabBar": {"selectedIndex": 0, "items": [
        {"title": "Home", "pageId": "home"},
        {"title": "Me", "pageId": "profile"}
    ]},
    "modals": {"logout": {"title": "Log out?", "content": "You can log back in any time",
                          "buttons": [{"text": "Cancel"}, {"text": "Log out", "type": "danger"}]}},
    "state": {"user": {"name": "Ada"}, "cart": {"count": 0}}
}"#;

const SCRIPT: &str = r#"[
    {"type": "navigateTo", "pageId": "details", "params": {"id": 7}},
    {"type": "updateState", "statePath": "cart.count", "stateValue": 1},
    {"type": "updateState", "statePath": "cart.count", "stateValue": 2},
    {"type": "request", "url": "/api/user/info", "responsePath": "/profile",
     "successAction": {"type": "showToast", "toast": {"message": "profile loaded", "type": "success"}}},
    {"type": "navigateTo", "pageId": "nowhere"},
    {"type": "navigateBack"},
    {"type": "switchTab", "pageId": "profile"},
    {"type": "showModal", "modalId": "logout"},
    {"type": "delay", "duration": 300, "nextAction": {"type": "hideModal"}},
    {"type": "reLaunch"}
]"#;

/// Prints every presentation callback
struct PrintingCallbacks;

impl ActionCallbacks for PrintingCallbacks {
    fn on_navigate(&self, page_id: &str, params: &ValueMap) {
        println!("  [ui] navigate -> {} {}", page_id, Value::Map(params.clone()));
    }

    fn on_navigate_back(&self, depth: usize) {
        println!("  [ui] back {}", depth);
    }

    fn on_switch_tab(&self, index: usize) {
        println!("  [ui] tab {}", index);
    }

    fn on_show_toast(&self, config: &ToastConfig) {
        println!("  [ui] toast ({}) {}", config.kind, config.message);
    }

    fn on_hide_toast(&self) {
        println!("  [ui] toast hidden");
    }

    fn on_show_modal(&self, config: &ModalConfig) {
        let buttons: Vec<&str> = config.buttons.iter().map(|b| b.text.as_str()).collect();
        println!("  [ui] modal '{}' {:?}", config.title, buttons);
    }

    fn on_hide_modal(&self) {
        println!("  [ui] modal hidden");
    }

    fn on_show_action_sheet(&self, config: &ActionSheetConfig) {
        println!("  [ui] action sheet with {} item(s)", config.items.len());
    }

    fn on_hide_action_sheet(&self) {
        println!("  [ui] action sheet hidden");
    }

    fn on_state_update(&self, path: &str, value: &Value) {
        println!("  [ui] state {} = {}", path, value);
    }
}

fn chunk_size() -> usize {
    std::env::var("CHUNK_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(48)
}

/// Feed `text` to the compiler `size` characters at a time
fn stream_document(text: &str, size: usize) -> Option<Value> {
    let mut compiler = SpecStreamCompiler::new();
    let chars: Vec<char> = text.chars().collect();
    let mut pushes = 0;
    for chunk in chars.chunks(size) {
        let chunk: String = chunk.iter().collect();
        pushes += 1;
        let update = compiler.push(&chunk);
        if update.is_complete {
            println!(
                "Document complete after {} pushes ({} patches)",
                pushes,
                update.new_patches.len()
            );
        }
    }
    compiler.result().cloned()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> protoflow_runtime::Result<()> {
    logging::init(log::LevelFilter::Info);
    println!("=== ProtoFlow Stream Player ===\n");

    let mut args = std::env::args().skip(1);
    let text = match args.next() {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEMO_APP.to_string(),
    };
    let config = match args.next() {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };

    let Some(document) = stream_document(&text, chunk_size()) else {
        log::error!("stream ended before the document was complete");
        return Ok(());
    };
    let app = AppConfig::from_value(&document)?;
    println!("Loaded '{}' v{} with {} page(s)\n", app.name, app.version, app.pages.len());

    let runtime = Runtime::new(app, config);
    runtime.set_callbacks(Arc::new(PrintingCallbacks));
    runtime.add_page_listener(|event| {
        println!("  [pages] {:?} -> '{}' (size {})", event.kind, event.page_id, event.stack_size);
    });

    let script: Vec<Value> = serde_json::from_str(SCRIPT)?;
    for step in &script {
        let kind = step.get("type").map(|t| t.to_string()).unwrap_or_default();
        println!("> {}", kind);
        let outcome = runtime.dispatch_value(step).await;
        println!("  = {:?}, page '{}'", outcome, runtime.current_page_id());
        // Give debounced watchers and toast timers a chance to run
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!("\nFinal state: {}", runtime.state());
    if let Some(tree) = runtime.current_page_tree() {
        println!("Current page tree: {}", tree);
    }
    runtime.shutdown();
    Ok(())
}
