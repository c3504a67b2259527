//! Panic isolation for externally supplied callbacks

use crate::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run a collaborator callback, turning a panic into a logged error
pub(crate) fn guarded<R>(what: &str, f: impl FnOnce() -> R) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log::error!("{} panicked: {}", what, message);
        Error::CallbackPanicked(format!("{}: {}", what, message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
