//! ProtoFlow Runtime - actions, navigation and reactive state for app documents
//!
//! This crate runs an application document (`AppConfig`):
//! - Global state store with slash/dot path writes (`Store`)
//! - Bounded navigation stack with change listeners (`PageManager`)
//! - Declarative actions as a closed tagged union (`Action`, `ActionKind`)
//! - The action interpreter (`ActionExecutor`) and its seams to the UI
//!   (`ActionCallbacks`) and the network (`Transport`)
//! - Path watchers with conditions, debounce, throttle and `once` (`StateWatcher`)
//! - A composition root that wires everything for one app (`Runtime`)
//!
//! ## Async
//!
//! Actions run on tokio. `request`, `delay` and watcher-triggered actions may
//! suspend; toast auto-hide and debounce are owned, cancelable timers.
//! `Runtime::shutdown` (or dropping the runtime) cancels all of them.
//!
//! ## Features
//!
//! Enable `http` for a `reqwest` backed transport:
//! ```toml
//! protoflow-runtime = { version = "0.1", features = ["http"] }
//! ```

pub mod action;
pub mod app;
pub mod callbacks;
mod config;
mod error;
pub mod executor;
mod guard;
pub mod logging;
pub mod overlay;
pub mod page;
mod runtime;
pub mod store;
pub mod timer;
pub mod transport;
pub mod watcher;

pub use action::{Action, ActionKind};
pub use app::AppConfig;
pub use callbacks::{ActionCallbacks, NoopCallbacks, RecordingCallbacks, StateObserver, UiEvent};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use executor::{ActionExecutor, Outcome, Wiring};
pub use page::{PageChangeEvent, PageChangeKind, PageManager, PageStackEntry};
pub use runtime::Runtime;
pub use store::Store;
pub use transport::{MockTransport, RequestDescriptor, Transport};
pub use watcher::{StateWatcher, WatchContext, WatcherConfig, WatcherTrigger};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Re-export the value model so hosts need a single dependency
pub use protoflow_core::{Value, ValueMap};
