//! Error types for protoflow-runtime

use thiserror::Error;

/// Runtime error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Page not in stack: {0}")]
    PageNotInStack(String),

    #[error("Page stack is empty")]
    EmptyStack,

    #[error("Cannot pop: stack has only one page")]
    StackFloor,

    #[error("Modal not found: {0}")]
    ModalNotFound(String),

    #[error("Action sheet not found: {0}")]
    ActionSheetNotFound(String),

    #[error("Toast not found: {0}")]
    ToastNotFound(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Callback panicked: {0}")]
    CallbackPanicked(String),

    #[error("Action cascade exceeded depth {depth}")]
    CascadeLimit { depth: u32 },

    #[error("Executor is not initialized")]
    Inert,

    #[error("Config error: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] protoflow_core::Error),
}

impl Error {
    /// Configuration errors abort the action without routing to `errorAction`
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::PageNotFound(_)
                | Error::ModalNotFound(_)
                | Error::ActionSheetNotFound(_)
                | Error::ToastNotFound(_)
                | Error::TabNotFound(_)
                | Error::InvalidAction(_)
                | Error::Inert
        )
    }

    /// Stack-discipline errors leave the page stack untouched
    pub fn is_stack_discipline(&self) -> bool {
        matches!(
            self,
            Error::PageNotInStack(_) | Error::EmptyStack | Error::StackFloor
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
