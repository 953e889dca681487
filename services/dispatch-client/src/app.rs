//! Client wiring
//!
//! Builds the credential store, refresher, coordinator, interceptor and
//! executor from configuration and runs one command against them.

use std::sync::Arc;

use anyhow::{Context, Result};
use dispatch_auth::{FileTokenStore, HttpTokenRefresher, TokenProvider};
use dispatch_net::{
    AuthInterceptor, NetworkManager, RefreshCoordinator, RegisterRequest, Route, SessionEvents,
    SessionService, spawn_logout_listener,
};
use reqwest::header::HeaderName;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cli::Command;
use crate::config::Config;

pub struct App {
    tokens: Arc<FileTokenStore>,
    manager: NetworkManager,
    session: SessionService,
    api_base_url: String,
    logout_listener: JoinHandle<()>,
}

impl App {
    /// Must be called inside a tokio runtime: the logout listener is spawned here.
    pub fn build(config: &Config) -> Result<Self> {
        let tokens = Arc::new(
            FileTokenStore::load(config.credentials.path.clone()).with_context(|| {
                format!(
                    "failed to load credentials from {}",
                    config.credentials.path.display()
                )
            })?,
        );

        if let Some(seed) = &config.seed {
            info!("seeding credentials from environment");
            tokens.save_tokens(seed.access.expose_owned(), seed.refresh.expose_owned());
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        let refresher = HttpTokenRefresher::new(client.clone(), config.refresh_url(), tokens.clone())
            .with_user_id_header(config.auth.user_id_header.clone());

        let events = SessionEvents::new();
        let logout_listener = spawn_logout_listener(&events, tokens.clone());

        let coordinator = RefreshCoordinator::new(
            Arc::new(refresher),
            events.logout_hook(),
            config.refresh_timeout(),
        );

        let user_id_header = HeaderName::from_bytes(config.auth.user_id_header.as_bytes())
            .context("invalid user id header")?;
        let interceptor =
            AuthInterceptor::new(tokens.clone(), coordinator).with_user_id_header(user_id_header);

        let manager = NetworkManager::new(client, Arc::new(interceptor));
        let session = SessionService::new(
            manager.clone(),
            tokens.clone(),
            events,
            config.api.auth_base_url.clone(),
        );

        Ok(Self {
            tokens,
            manager,
            session,
            api_base_url: config.api.api_base_url.clone(),
            logout_listener,
        })
    }

    pub async fn run(&self, command: Command) -> Result<Value> {
        match command {
            Command::Login { username, password } => {
                let response = self.session.login(&username, &password).await?;
                Ok(json!({ "signedIn": true, "userId": response.user_id }))
            }
            Command::Register {
                first_name,
                last_name,
                email,
                password,
                address,
            } => {
                let response = self
                    .session
                    .register(&RegisterRequest {
                        first_name: &first_name,
                        last_name: &last_name,
                        email: &email,
                        password: &password,
                        address: &address,
                    })
                    .await?;
                Ok(json!({ "signedIn": true, "userId": response.user_id }))
            }
            Command::ForgotPassword { email } => {
                let response = self.session.forgot_password(&email).await?;
                Ok(json!({ "message": response.message }))
            }
            Command::Logout => {
                self.session.logout();
                Ok(json!({ "signedIn": false }))
            }
            Command::Status => Ok(self.status()),
            Command::Get { path } => {
                let body: Value = self.manager.get(Route::new(&self.api_base_url, path)).await?;
                Ok(body)
            }
        }
    }

    /// Which credentials are held. Values are never printed.
    fn status(&self) -> Value {
        let credentials = self.tokens.credentials();
        json!({
            "signedIn": credentials.access_token.is_some(),
            "accessToken": credentials.access_token.is_some(),
            "refreshToken": credentials.refresh_token.is_some(),
            "userId": credentials.user_id.is_some(),
            "credentialsPath": self.tokens.path().display().to_string(),
        })
    }

    /// Drop every session event sender and wait for the logout listener to
    /// finish, so a logout raised by the last command reaches the store
    /// before the process exits.
    pub async fn shutdown(self) {
        let Self {
            tokens,
            manager,
            session,
            logout_listener,
            ..
        } = self;
        drop(session);
        drop(manager);
        drop(tokens);
        let _ = logout_listener.await;
    }
}
