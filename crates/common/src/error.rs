//! Configuration and startup errors shared by binaries

use thiserror::Error;

/// Startup error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Env(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_detail() {
        let err = Error::Config("auth_base_url must start with http".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: auth_base_url must start with http"
        );
    }

    #[test]
    fn io_error_converts_with_question_mark() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here/dispatch.toml")?)
        }
        let err = read_missing().unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err:?}");
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn toml_error_converts() {
        let parsed: std::result::Result<toml::Table, _> = toml::from_str("not = [valid");
        let err: Error = parsed.unwrap_err().into();
        assert!(
            format!("{err:?}").contains("Toml"),
            "Debug should name the variant, got: {err:?}"
        );
    }
}
