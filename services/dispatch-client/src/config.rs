//! Configuration types and loading
//!
//! Settings come from the TOML file, with defaults for anything it omits.
//! The file path is taken from `--config`, then `DISPATCH_CONFIG`, then the
//! default name. The environment overrides no settings. Tokens are never read
//! from the TOML; `DISPATCH_ACCESS_TOKEN` and `DISPATCH_REFRESH_TOKEN` can seed
//! the credential store at startup.

use common::Secret;
use dispatch_auth::{DEFAULT_API_BASE_URL, DEFAULT_AUTH_BASE_URL, REFRESH_PATH, USER_ID_HEADER};
use dispatch_net::{Endpoint, Route};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name when neither `--config` nor `DISPATCH_CONFIG` is set
pub const DEFAULT_CONFIG_PATH: &str = "dispatch-client.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(skip)]
    pub seed: Option<SeedTokens>,
}

/// Dispatch API endpoints and transport settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Token refresh settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// 0 disables the refresh deadline
    #[serde(default = "default_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

/// Credential store location
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

/// Token pair supplied through the environment
#[derive(Debug, Clone)]
pub struct SeedTokens {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

fn default_auth_base_url() -> String {
    DEFAULT_AUTH_BASE_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_path() -> String {
    REFRESH_PATH.to_string()
}

fn default_user_id_header() -> String {
    USER_ID_HEADER.to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base_url(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            refresh_timeout_secs: default_timeout(),
            user_id_header: default_user_id_header(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and read the optional token seed
    /// from the environment.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Defaults plus the optional token seed, for running without a config file.
    pub fn from_env() -> common::Result<Self> {
        Config::default().finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        self.validate()?;
        self.seed = seed_from_env()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("auth_base_url", &self.api.auth_base_url),
            ("api_base_url", &self.api.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if reqwest::header::HeaderName::from_bytes(self.auth.user_id_header.as_bytes()).is_err() {
            return Err(common::Error::Config(format!(
                "user_id_header is not a valid header name: {}",
                self.auth.user_id_header
            )));
        }

        Ok(())
    }

    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        Route::new(&self.api.auth_base_url, &self.auth.refresh_path).url()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        match self.auth.refresh_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Resolve config file path from CLI arg or DISPATCH_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("DISPATCH_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}

/// Both variables must be set; one without the other is a startup error.
fn seed_from_env() -> common::Result<Option<SeedTokens>> {
    let access = std::env::var("DISPATCH_ACCESS_TOKEN").ok().filter(|v| !v.is_empty());
    let refresh = std::env::var("DISPATCH_REFRESH_TOKEN").ok().filter(|v| !v.is_empty());
    match (access, refresh) {
        (Some(access), Some(refresh)) => Ok(Some(SeedTokens {
            access: Secret::new(access),
            refresh: Secret::new(refresh),
        })),
        (None, None) => Ok(None),
        _ => Err(common::Error::Env(
            "DISPATCH_ACCESS_TOKEN and DISPATCH_REFRESH_TOKEN must be set together".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_seed_env() {
        unsafe {
            remove_env("DISPATCH_ACCESS_TOKEN");
            remove_env("DISPATCH_REFRESH_TOKEN");
        }
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch-client.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn full_config_loads() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let (_dir, path) = write_config(
            r#"
[api]
auth_base_url = "http://127.0.0.1:9000/oapi/v1"
api_base_url = "http://127.0.0.1:9000/osapi/v1"
timeout_secs = 10

[auth]
refresh_path = "/auth/refresh"
refresh_timeout_secs = 0
user_id_header = "x-user-id"

[credentials]
path = "/tmp/dispatch-creds.json"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.refresh_url(), "http://127.0.0.1:9000/oapi/v1/auth/refresh");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_timeout(), None);
        assert_eq!(config.auth.user_id_header, "x-user-id");
        assert_eq!(config.credentials.path, PathBuf::from("/tmp/dispatch-creds.json"));
        assert!(config.seed.is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let (_dir, path) = write_config("");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert_eq!(config.api.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.refresh_url(), "https://transpots.ca/oapi/v1/auth/refresh");
        assert_eq!(config.refresh_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.auth.user_id_header, "userId");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let (_dir, path) = write_config(
            r#"
[api]
auth_base_url = "ftp://transpots.ca"
"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("auth_base_url"), "got: {err}");
    }

    #[test]
    fn rejects_zero_timeout() {
        let (_dir, path) = write_config(
            r#"
[api]
timeout_secs = 0
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_invalid_user_id_header() {
        let (_dir, path) = write_config(
            r#"
[auth]
user_id_header = "user id"
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/dispatch-client.toml")).unwrap_err();
        assert!(matches!(err, common::Error::Io(_)), "got: {err:?}");
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let (_dir, path) = write_config("not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn seed_tokens_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            set_env("DISPATCH_ACCESS_TOKEN", "at_env");
            set_env("DISPATCH_REFRESH_TOKEN", "rt_env");
        }

        let config = Config::from_env().unwrap();
        let seed = config.seed.unwrap();
        assert_eq!(seed.access.expose(), "at_env");
        assert_eq!(seed.refresh.expose(), "rt_env");

        clear_seed_env();
    }

    #[test]
    fn environment_only_supplies_the_seed() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            set_env("DISPATCH_ACCESS_TOKEN", "at_env");
            set_env("DISPATCH_REFRESH_TOKEN", "rt_env");
        }
        let (_dir, path) = write_config(
            r#"
[api]
api_base_url = "http://127.0.0.1:9000/osapi/v1"
timeout_secs = 12
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.api_base_url, "http://127.0.0.1:9000/osapi/v1");
        assert_eq!(config.api.timeout_secs, 12);
        assert_eq!(config.api.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert!(config.seed.is_some());

        clear_seed_env();
    }

    #[test]
    fn half_seed_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        unsafe { set_env("DISPATCH_ACCESS_TOKEN", "at_env") };

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, common::Error::Env(_)), "got: {err:?}");

        clear_seed_env();
    }

    #[test]
    fn resolve_path_prefers_cli() {
        assert_eq!(
            Config::resolve_path(Some("/etc/dispatch.toml")),
            PathBuf::from("/etc/dispatch.toml")
        );
    }
}
