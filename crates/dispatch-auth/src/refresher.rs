//! Token refresh seam
//!
//! `TokenRefresher` is what the refresh coordinator calls once per refresh
//! round. `HttpTokenRefresher` is the production implementation: it reads the
//! refresh token from the store, calls the refresh endpoint on its own
//! interceptor-free client and saves the new pair before reporting success.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::USER_ID_HEADER;
use crate::credentials::TokenProvider;
use crate::error::{Error, Result};
use crate::token::refresh_tokens;

/// Performs one token refresh.
///
/// Uses `Pin<Box<dyn Future>>` so the coordinator can hold an
/// `Arc<dyn TokenRefresher>`.
pub trait TokenRefresher: Send + Sync {
    /// Refresh the session's tokens. `Ok(())` means the credential store now
    /// holds a new access/refresh pair.
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Refreshes tokens against the dispatch API refresh endpoint.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    refresh_url: String,
    user_id_header: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTokenRefresher {
    /// `client` must be a plain client, never one routed through the auth
    /// interceptor.
    pub fn new(
        client: reqwest::Client,
        refresh_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            refresh_url: refresh_url.into(),
            user_id_header: USER_ID_HEADER.to_string(),
            tokens,
        }
    }

    pub fn with_user_id_header(mut self, header: impl Into<String>) -> Self {
        self.user_id_header = header.into();
        self
    }

    async fn refresh_once(&self) -> Result<()> {
        let Some(refresh) = self.tokens.refresh_token() else {
            warn!("no refresh token available, cannot refresh session");
            return Err(Error::MissingRefreshToken);
        };
        let user_id = self.tokens.user_id();

        info!(url = %self.refresh_url, "refreshing access token");

        let tokens = refresh_tokens(
            &self.client,
            &self.refresh_url,
            &refresh,
            user_id.as_deref(),
            &self.user_id_header,
        )
        .await?;

        self.tokens
            .save_tokens(tokens.access_token, tokens.refresh_token);
        info!("access token refreshed");
        Ok(())
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.refresh_once())
    }
}
