use thiserror::Error;

use crate::db::StoreError;

/// Failures surfaced to the connection that triggered them.
///
/// None of these are fatal: a session reports the error as an `error` event
/// and keeps serving the socket.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed event fields, or an event that is not valid in the
    /// connection's current state.
    #[error("{0}")]
    Validation(String),

    /// Sender or receiver is not in the user directory.
    #[error("User not found")]
    UserNotFound(String),

    /// The translation provider failed or timed out. Recovered locally with
    /// fallback text, never sent to a client.
    #[error("translation not available: {0}")]
    TranslationUnavailable(String),

    /// A store operation failed; nothing was delivered.
    #[error("storage error: {0}")]
    Persistence(#[from] StoreError),

    #[error("presence registry is not running")]
    RegistryClosed,
}

impl RelayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
