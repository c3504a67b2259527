//! Runtime Configuration - Stack bounds, overlay timing and cascade limits
//!
//! These are tuning knobs for the runtime itself, independent of any app
//! document. They are usually left at their defaults or loaded from a small
//! RON file:
//!
//! ```ron
//! (
//!     max_stack_size: 20,
//!     toast_duration_ms: 1500,
//! )
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for a runtime instance
///
/// Every field is optional in serialized form and falls back to its default.
///
/// # Example
///
/// ```
/// use protoflow_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_ron_str("(max_stack_size: 0, toast_duration_ms: 500)").unwrap();
/// assert_eq!(config.max_stack_size, 1);
/// assert_eq!(config.toast_duration_ms, 500);
/// assert_eq!(config.delay_duration_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Page stack capacity; the oldest entry is evicted beyond it
    ///
    /// Clamped to at least 1. An app's `router.historyLimit` overrides it.
    pub max_stack_size: usize,

    /// Toast auto-hide delay when the toast does not set `duration`
    pub toast_duration_ms: u64,

    /// `delay` action duration when the action does not set `duration`
    pub delay_duration_ms: u64,

    /// Deepest causal chain of actions allowed
    ///
    /// Top-level dispatch is depth 0. Follow-up actions (`successAction`,
    /// `errorAction`, `nextAction`) and watcher-triggered actions run one level
    /// deeper. Past this depth an action fails without running.
    pub max_cascade_depth: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 50,
            toast_duration_ms: 2000,
            delay_duration_ms: 1000,
            max_cascade_depth: 32,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: RuntimeConfig = ron::from_str(text)?;
        Ok(config.clamped())
    }

    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&content)
    }

    /// Set the page stack capacity (clamped to at least 1)
    pub fn with_max_stack_size(mut self, n: usize) -> Self {
        self.max_stack_size = n.max(1);
        self
    }

    pub fn with_max_cascade_depth(mut self, depth: u32) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay_duration_ms)
    }

    fn clamped(mut self) -> Self {
        self.max_stack_size = self.max_stack_size.max(1);
        self
    }
}
