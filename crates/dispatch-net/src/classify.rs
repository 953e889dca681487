//! Failure classification
//!
//! Maps a raw transport failure plus the optional HTTP status into the closed
//! `NetworkError` set. Status codes win; without a recognised status, failures
//! where the exchange never completed at the socket level (timeout, refused
//! connection, DNS, offline) become `NoConnection`, and anything else keeps
//! its description as `Unknown`.

use crate::error::NetworkError;

/// Where in the exchange a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Request or connect deadline elapsed
    Timeout,
    /// Connection could not be established (refused, DNS, unreachable)
    Connect,
    /// Sending the request failed before a response arrived
    Request,
    /// A response arrived but its status was not 2xx
    Status,
    /// Reading or decoding the response body failed
    Body,
    Other,
}

/// A transport-level failure, detached from `reqwest::Error` so it can be
/// built in tests and compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure for a response that arrived with a non-2xx status.
    pub fn status(status: u16) -> Self {
        Self::new(
            TransportFailureKind::Status,
            format!("Response status code was unacceptable: {status}."),
        )
    }

    /// True when the exchange never completed at the session level.
    pub fn is_session_level(&self) -> bool {
        matches!(
            self.kind,
            TransportFailureKind::Timeout
                | TransportFailureKind::Connect
                | TransportFailureKind::Request
        )
    }
}

impl From<&reqwest::Error> for TransportFailure {
    fn from(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            TransportFailureKind::Connect
        } else if err.is_status() {
            TransportFailureKind::Status
        } else if err.is_decode() || err.is_body() {
            TransportFailureKind::Body
        } else if err.is_request() {
            TransportFailureKind::Request
        } else {
            TransportFailureKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Classify a failed request.
///
/// Total over its inputs: every combination maps to exactly one variant.
pub fn classify(failure: &TransportFailure, status: Option<u16>) -> NetworkError {
    if let Some(status) = status {
        match status {
            401 => return NetworkError::Unauthorized,
            403 => return NetworkError::Forbidden,
            404 => return NetworkError::NotFound,
            500..=599 => return NetworkError::ServerError(status),
            _ => {}
        }
    }

    if failure.is_session_level() {
        return NetworkError::NoConnection;
    }

    NetworkError::Unknown(failure.message.clone())
}
