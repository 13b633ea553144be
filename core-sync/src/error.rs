use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No access token configured")]
    MissingToken,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upload session expired: {0}")]
    SessionExpired(String),

    #[error("Upload protocol violation: {0}")]
    Protocol(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Local file error: {0}")]
    LocalIo(String),

    #[error("Remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Record store error: {0}")]
    Store(#[from] BridgeError),

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),
}

impl SyncError {
    /// Classify a failed remote call by its status code.
    pub fn from_response(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            0 => SyncError::Transport(message),
            400 | 422 => SyncError::Validation(message),
            status => SyncError::Remote { status, message },
        }
    }

    /// Whether the next scheduled tick may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Protocol(_) | SyncError::Remote { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
