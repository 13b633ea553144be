//! Error types for the Vimeo provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Vimeo provider errors
///
/// These stay inside the client: every `VideoHost` call folds them into the
/// tagged response value it returns.
#[derive(Error, Debug)]
pub enum VimeoError {
    /// No access token is configured
    #[error("Vimeo access token is not configured")]
    MissingToken,

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// API request returned a non-2xx status
    #[error("Vimeo API error (status {status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// The upload server broke the tus contract
    #[error("tus protocol violation: {0}")]
    Protocol(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Vimeo operations
pub type Result<T> = std::result::Result<T, VimeoError>;

impl From<VimeoError> for BridgeError {
    fn from(error: VimeoError) -> Self {
        match error {
            VimeoError::MissingToken => {
                BridgeError::NotAvailable("Vimeo access token".to_string())
            }
            VimeoError::Transport(msg) => {
                BridgeError::OperationFailed(format!("Transport error: {}", msg))
            }
            VimeoError::Api {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            VimeoError::Protocol(msg) => {
                BridgeError::OperationFailed(format!("Protocol error: {}", msg))
            }
            VimeoError::Parse(msg) => BridgeError::Serialization(msg),
            VimeoError::Bridge(e) => e,
        }
    }
}
