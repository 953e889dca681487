//! Error types for credential and refresh operations

/// Errors from credential storage and token refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("token refresh timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
