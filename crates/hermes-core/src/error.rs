use thiserror::Error;

/// Application-wide error types for Hermes.
#[derive(Error, Debug)]
pub enum AppError {
    /// The message transport rejected a publish or receive.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Wire frame could not be encoded/decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel has been closed and will produce no more frames.
    #[error("Channel closed")]
    ChannelClosed,

    /// `start()` was called on a coordinator that is already running.
    #[error("Coordinator already started")]
    AlreadyStarted,

    /// The unit-of-work collaborator rejected an operation.
    #[error("Unit error: {0}")]
    Unit(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the consume loop can keep running after this error.
    ///
    /// Lagged subscriptions and bad frames affect one message; a closed
    /// channel or a double-start cannot be recovered from in place.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_) | AppError::Serialization(_) | AppError::Unit(_)
        )
    }
}
