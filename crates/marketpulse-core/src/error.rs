//! MarketPulse error types.

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Errors surfaced by the MarketPulse crates.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// Configuration loading or parsing failed.
    #[error("config error: {0}")]
    Config(String),

    /// The action store rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    /// An action item could not be found by its stable id.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// No handler is registered for an action type.
    #[error("no handler registered for action type '{0}'")]
    UnknownActionType(String),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
