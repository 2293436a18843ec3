//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading a `tinker.toml` or `plugin.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed into the expected shape.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("plugin.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: plugin.name");
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::Parse("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_invalid() {
        let err = ConfigError::Invalid {
            field: "plugin.repository".to_string(),
            reason: "expected owner/name".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "invalid value for plugin.repository: expected owner/name"
        );
    }

    #[test]
    fn display_io_error_names_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/plugins/widget/plugin.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let display = format!("{err}");
        assert!(display.starts_with("failed to read /plugins/widget/plugin.toml"));
    }
}
