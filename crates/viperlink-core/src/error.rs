// ── Core error types ──
//
// User-facing failure taxonomy. Consumers never see HTTP status codes
// or JSON parse failures directly; the `From<viperlink_api::Error>`
// impl translates transport-layer errors into the two conditions that
// matter to the platform: re-enter credentials, or retry later.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credentials were rejected or expired and could not be repaired
    /// within the retry budget. Requires the user to re-enter
    /// credentials; never retried automatically.
    #[error("Re-authentication required: {message}")]
    AuthenticationRequired { message: String },

    /// A refresh or setup cycle failed. Retryable; the platform's own
    /// scheduling governs when.
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    /// Invalid account configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<viperlink_api::Error> for CoreError {
    fn from(err: viperlink_api::Error) -> Self {
        if err.is_auth_error() {
            Self::AuthenticationRequired {
                message: err.to_string(),
            }
        } else {
            Self::UpdateFailed {
                message: format!("Error communicating with API: {err}"),
            }
        }
    }
}
