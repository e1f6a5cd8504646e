//! Error types for the schema sync library.

use thiserror::Error;

/// Boxed engine-side failure carried by [`SchemaError::Engine`].
pub type EngineSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for codec, catalog and reconciliation operations.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Unrecognized native type string, or a value whose kind does not
    /// match its column descriptor.
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Malformed text for a known column kind.
    #[error("Decode error at element {position}: {cause}")]
    Decode { position: usize, cause: String },

    /// The catalog has no table with the requested name.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A query expected exactly one row and got none.
    #[error("No record returned by statement: {statement}")]
    NoRecord {
        statement: String,
        params: Vec<Option<String>>,
    },

    /// The database engine rejected a statement.
    #[error("Engine error executing statement: {statement}")]
    Engine {
        statement: String,
        params: Vec<Option<String>>,
        #[source]
        source: EngineSource,
    },

    /// A table definition violates its own structural rules.
    #[error("Invalid table definition: {0}")]
    InvalidDefinition(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Create a Decode error for the given element position.
    pub fn decode(position: usize, cause: impl std::fmt::Display) -> Self {
        SchemaError::Decode {
            position,
            cause: cause.to_string(),
        }
    }

    /// Wrap an engine failure with the statement and parameters that caused it.
    pub fn engine<E>(statement: impl Into<String>, params: &[Option<String>], source: E) -> Self
    where
        E: Into<EngineSource>,
    {
        SchemaError::Engine {
            statement: statement.into(),
            params: params.to_vec(),
            source: source.into(),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        SchemaError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Statement text attached to this error, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            SchemaError::NoRecord { statement, .. } | SchemaError::Engine { statement, .. } => {
                Some(statement)
            }
            _ => None,
        }
    }

    /// Process exit code for the CLI.
    ///
    /// Problems in the user's input (config, definitions, types) map to 2,
    /// runtime failures to 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            SchemaError::Config(_)
            | SchemaError::InvalidDefinition(_)
            | SchemaError::InvalidType(_)
            | SchemaError::Yaml(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let SchemaError::Engine { params, .. } | SchemaError::NoRecord { params, .. } = self {
            if !params.is_empty() {
                output.push_str(&format!("  Params: {:?}\n", params));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema sync operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_keeps_statement_and_params() {
        let err = SchemaError::engine(
            "ALTER TABLE t DROP COLUMN c",
            &[Some("x".to_string()), None],
            "column \"c\" does not exist",
        );
        assert_eq!(err.statement(), Some("ALTER TABLE t DROP COLUMN c"));

        let detailed = err.format_detailed();
        assert!(detailed.contains("ALTER TABLE t DROP COLUMN c"));
        assert!(detailed.contains("Params: [Some(\"x\"), None]"));
        assert!(detailed.contains("Caused by:\n  1: column \"c\" does not exist"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SchemaError::Config("x".into()).exit_code(), 2);
        assert_eq!(SchemaError::InvalidDefinition("x".into()).exit_code(), 2);
        assert_eq!(SchemaError::TableNotFound("t".into()).exit_code(), 1);
        assert_eq!(SchemaError::pool("refused", "connecting").exit_code(), 1);
    }

    #[test]
    fn test_decode_error_display() {
        let err = SchemaError::decode(3, "invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "Decode error at element 3: invalid digit found in string"
        );
    }
}
