use thiserror::Error;

/// Errors returned by the Drive client.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Transport-level failure (DNS, TLS, connection reset, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request metadata could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Drive answered with a non-success status
    #[error("Drive API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl DriveError {
    /// Whether the failure is an authentication/authorization rejection.
    pub fn is_auth(&self) -> bool {
        matches!(self, DriveError::Api { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
