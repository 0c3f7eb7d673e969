use thiserror::Error;

/// Top-level error type for the `viperlink-api` crate.
///
/// Covers every failure mode of the SmartStart cloud API surface.
/// `viperlink-core` maps these into user-facing diagnostics; the split
/// that matters there is auth-class vs. everything else, exposed via
/// [`is_auth_error`](Error::is_auth_error).
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, locked account, malformed
    /// authentication response).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Bearer token rejected by the API (HTTP 401).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// An authenticated endpoint was called before any login succeeded.
    #[error("Not authenticated")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout,
    /// body decode, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success status from the API.
    #[error("API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error is authentication-class: the stored
    /// credential is missing, rejected, or expired. The coordinator
    /// re-authenticates on these; every other variant is an API-class
    /// failure handled by carry-forward or retry scheduling.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::SessionExpired | Self::NotAuthenticated
        )
    }
}
