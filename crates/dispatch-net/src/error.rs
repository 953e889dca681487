//! Classified request errors
//!
//! The closed set of failures a caller can observe. Display strings are
//! stable and safe to show to end users as-is.

/// A request failure after classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Unauthorized. Please login again.")]
    Unauthorized,

    #[error("You don't have permission to access this resource.")]
    Forbidden,

    #[error("The requested resource was not found.")]
    NotFound,

    #[error("Server error occurred. Code: {0}")]
    ServerError(u16),

    #[error("No internet connection. Please check your network.")]
    NoConnection,

    #[error("Failed to process server response.")]
    DecodingError,

    #[error("{0}")]
    Unknown(String),
}

impl NetworkError {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            NetworkError::Unauthorized => "unauthorized",
            NetworkError::Forbidden => "forbidden",
            NetworkError::NotFound => "not_found",
            NetworkError::ServerError(_) => "server_error",
            NetworkError::NoConnection => "no_connection",
            NetworkError::DecodingError => "decoding_error",
            NetworkError::Unknown(_) => "unknown",
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
