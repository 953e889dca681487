//! Transpots dispatch API client
//!
//! Command-line front end over the authenticated request pipeline:
//! 1. Loads configuration and the on-disk credential store
//! 2. Signs in, registers or signs out against the auth API
//! 3. Issues authenticated requests, refreshing the session transparently

mod app;
mod cli;
mod config;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::config::{Config, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let invocation = cli::parse(std::env::args().skip(1))?;

    let config_path = Config::resolve_path(invocation.config_path.as_deref());
    let config = if config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else if config_path.as_os_str() == DEFAULT_CONFIG_PATH {
        info!("no config file found, using defaults");
        Config::from_env().context("invalid environment configuration")?
    } else {
        anyhow::bail!("config file not found: {}", config_path.display());
    };

    info!(
        auth_base_url = %config.api.auth_base_url,
        api_base_url = %config.api.api_base_url,
        credentials = %config.credentials.path.display(),
        "configuration loaded"
    );

    let app = App::build(&config)?;
    let outcome = app.run(invocation.command).await;
    app.shutdown().await;

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}
