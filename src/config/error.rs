//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("quill.toml parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_error_names_file() {
        let err = ConfigError::Io(
            PathBuf::from("site/quill.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("site/quill.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_toml_error_converts() {
        let err: ConfigError = toml::from_str::<toml::Value>("[build").unwrap_err().into();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_validation_display() {
        let err = ConfigError::Validation("[markdown.highlight] unknown theme `x`".into());
        assert_eq!(
            err.to_string(),
            "Config validation error: [markdown.highlight] unknown theme `x`"
        );
    }
}
