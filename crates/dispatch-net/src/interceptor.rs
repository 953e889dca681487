//! Request interception
//!
//! The executor runs every outgoing request through `RequestInterceptor::adapt`
//! and asks `RequestInterceptor::should_retry` after every failure.
//! `AuthInterceptor` injects the bearer token and user id and hands failures
//! to the refresh coordinator; it keeps no state of its own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dispatch_auth::TokenProvider;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use tracing::warn;

use crate::coordinator::{RefreshCoordinator, RetryDecision};
use crate::error::NetworkError;

/// Hooks invoked by the executor around each attempt.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn RequestInterceptor>`).
pub trait RequestInterceptor: Send + Sync {
    /// Prepare an outgoing request. Must not block.
    fn adapt(&self, request: &mut reqwest::Request);

    /// Decide what to do with a failed attempt.
    ///
    /// `retry_count` is how many times this logical request has already been
    /// replayed; the executor owns the counter.
    fn should_retry<'a>(
        &'a self,
        request: &'a reqwest::Request,
        error: &'a NetworkError,
        status: Option<u16>,
        retry_count: u32,
    ) -> Pin<Box<dyn Future<Output = RetryDecision> + Send + 'a>>;
}

/// Bearer-token interceptor backed by a credential store and a refresh
/// coordinator.
pub struct AuthInterceptor {
    tokens: Arc<dyn TokenProvider>,
    coordinator: RefreshCoordinator,
    user_id_header: HeaderName,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<dyn TokenProvider>, coordinator: RefreshCoordinator) -> Self {
        Self {
            tokens,
            coordinator,
            user_id_header: HeaderName::from_static("userid"),
        }
    }

    /// Override the user id header name (default `userId`).
    pub fn with_user_id_header(mut self, header: HeaderName) -> Self {
        self.user_id_header = header;
        self
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn adapt(&self, request: &mut reqwest::Request) {
        let credentials = self.tokens.credentials();
        let headers = request.headers_mut();

        if let Some(token) = credentials.access_token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("access token is not a valid header value, sending unauthenticated"),
            }
        }

        if let Some(user_id) = credentials.user_id {
            match HeaderValue::from_str(&user_id) {
                Ok(value) => {
                    headers.insert(self.user_id_header.clone(), value);
                }
                Err(_) => warn!(header = %self.user_id_header, "user id is not a valid header value, skipping"),
            }
        }
    }

    fn should_retry<'a>(
        &'a self,
        _request: &'a reqwest::Request,
        error: &'a NetworkError,
        status: Option<u16>,
        retry_count: u32,
    ) -> Pin<Box<dyn Future<Output = RetryDecision> + Send + 'a>> {
        Box::pin(
            self.coordinator
                .request_retry(retry_count, status, error.clone()),
        )
    }
}
