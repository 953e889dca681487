//! Sign-in, registration and sign-out
//!
//! Populates and clears the credential store around the authenticated
//! pipeline, and broadcasts session transitions to whoever hosts the client.
//! Login and registration go out on the plain path: there is no session to
//! refresh yet.

use std::sync::Arc;

use dispatch_auth::TokenProvider;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::coordinator::AuthFailureHook;
use crate::endpoint::Route;
use crate::error::Result;
use crate::executor::NetworkManager;

/// Session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
}

/// Broadcast channel for session transitions.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Hook for the refresh coordinator: a failed refresh round emits
    /// `LoggedOut`.
    pub fn logout_hook(&self) -> AuthFailureHook {
        let tx = self.tx.clone();
        Arc::new(move || {
            let _ = tx.send(SessionEvent::LoggedOut);
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub address: &'a str,
}

/// Registration answers with the same shape as login.
pub type RegisterResponse = LoginResponse;

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
}

/// Session operations against the auth base URL.
pub struct SessionService {
    manager: NetworkManager,
    tokens: Arc<dyn TokenProvider>,
    events: SessionEvents,
    auth_base_url: String,
}

impl SessionService {
    pub fn new(
        manager: NetworkManager,
        tokens: Arc<dyn TokenProvider>,
        events: SessionEvents,
        auth_base_url: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            tokens,
            events,
            auth_base_url: auth_base_url.into(),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let response: LoginResponse = self
            .manager
            .request_without_interceptor(
                Method::POST,
                Route::new(&self.auth_base_url, "/auth/login"),
                Some(&LoginRequest { username, password }),
            )
            .await?;
        self.establish(&response);
        Ok(response)
    }

    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<RegisterResponse> {
        let response: RegisterResponse = self
            .manager
            .request_without_interceptor(
                Method::POST,
                Route::new(&self.auth_base_url, "/auth/register"),
                Some(request),
            )
            .await?;
        self.establish(&response);
        Ok(response)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordResponse> {
        self.manager
            .request_without_interceptor::<_, ()>(
                Method::POST,
                Route::new(&self.auth_base_url, format!("/auth/forgot-password/{email}")),
                None,
            )
            .await
    }

    /// Clear stored credentials and announce the logout.
    pub fn logout(&self) {
        self.tokens.clear_tokens();
        info!("session cleared");
        self.events.emit(SessionEvent::LoggedOut);
    }

    fn establish(&self, response: &LoginResponse) {
        let refresh = response.refresh_token.clone().unwrap_or_default();
        if refresh.is_empty() {
            warn!("login response carried no refresh token, session cannot be refreshed");
        }
        self.tokens
            .save_tokens(response.access_token.clone(), refresh);
        if response.user_id.is_some() {
            self.tokens.set_user_id(response.user_id.clone());
        }
        info!(has_user_id = response.user_id.is_some(), "session established");
        self.events.emit(SessionEvent::LoggedIn);
    }
}

/// Clear `tokens` every time a `LoggedOut` event arrives.
///
/// This is the default subscriber for a failed refresh round; hosts with UI
/// state to reset subscribe on their own as well.
pub fn spawn_logout_listener(
    events: &SessionEvents,
    tokens: Arc<dyn TokenProvider>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::LoggedOut) => {
                    tokens.clear_tokens();
                    info!("credentials cleared after logout");
                }
                Ok(SessionEvent::LoggedIn) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
