use thiserror::Error;

/// Top-level error type for the commander crates.
///
/// Subsystem errors in `commander-action` wrap this where they touch
/// settings, the session config codec or the filesystem.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommanderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Path error: {0}")]
    Path(String),
}

impl From<toml::de::Error> for CommanderError {
    fn from(err: toml::de::Error) -> Self {
        CommanderError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CommanderError {
    fn from(err: toml::ser::Error) -> Self {
        CommanderError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CommanderError {
    fn from(err: serde_json::Error) -> Self {
        CommanderError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for commander operations.
pub type Result<T> = std::result::Result<T, CommanderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommanderError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = CommanderError::Path("~nobody".to_string());
        assert_eq!(err.to_string(), "Path error: ~nobody");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CommanderError = io_err.into();
        assert!(matches!(err, CommanderError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: CommanderError = err.unwrap_err().into();
        assert!(matches!(err, CommanderError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: CommanderError = err.unwrap_err().into();
        assert!(matches!(err, CommanderError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
