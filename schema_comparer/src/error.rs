//! Error types for the schema comparer

use thiserror::Error;

/// Result type for schema comparer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the schema comparer
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A metadata read against a live source failed
    #[error("Metadata fetch error: {0}")]
    MetadataFetchError(String),

    /// A required snapshot or object reference is missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// An object lacks data required to render valid SQL
    #[error("Cannot render SQL for {object}{}: {message}", constraint_suffix(.constraint))]
    SynthesisError {
        object: String,
        constraint: Option<String>,
        message: String,
    },

    /// A statement of a script failed; `executed` statements before it were already sent
    #[error("Apply error after {executed} statement(s) at `{statement}`: {message}")]
    ApplyError {
        executed: usize,
        statement: String,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    match constraint {
        Some(name) => format!(" (constraint {})", name),
        None => String::new(),
    }
}

impl Error {
    /// Build a synthesis error for a whole object
    pub fn synthesis(object: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SynthesisError {
            object: object.into(),
            constraint: None,
            message: message.into(),
        }
    }

    /// Build a synthesis error pointing at one constraint of an object
    pub fn synthesis_constraint(
        object: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::SynthesisError {
            object: object.into(),
            constraint: Some(constraint.into()),
            message: message.into(),
        }
    }
}

/// Convert Serde JSON errors to comparer errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert YAML errors to comparer errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to comparer errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_error_names_constraint() {
        let err = Error::synthesis_constraint("ORDERS", "FK_ORDERS_CUSTOMER", "missing referenced column");
        assert_eq!(
            err.to_string(),
            "Cannot render SQL for ORDERS (constraint FK_ORDERS_CUSTOMER): missing referenced column"
        );

        let err = Error::synthesis("ORDERS", "external file cannot be altered");
        assert_eq!(
            err.to_string(),
            "Cannot render SQL for ORDERS: external file cannot be altered"
        );
    }
}
