//! Error types for configuration loading and validation.

use lockstep_ir::SchemaError;

/// Errors that can occur when loading or validating a `lockstep.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A `[buses]` table does not describe a valid schema.
    #[error("invalid bus schema: {0}")]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("simulation.max_cycles must be positive".into());
        assert_eq!(
            format!("{err}"),
            "validation error: simulation.max_cycles must be positive"
        );
    }

    #[test]
    fn display_schema_error() {
        let err = ConfigError::from(SchemaError::UnknownKind("Fifo".into()));
        assert!(format!("{err}").starts_with("invalid bus schema:"));
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
