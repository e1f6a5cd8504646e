//! Identifier validation for generated DDL.
//!
//! Table, column, index and constraint names are interpolated into DDL as
//! written, unquoted, so that PostgreSQL folds them the same way it folds
//! hand-written SQL. They cannot be bound as parameters, so every name is
//! checked before it reaches a statement.

use crate::error::{Result, SchemaError};

/// PostgreSQL's NAMEDATALEN - 1.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Reject empty names, names containing NUL, and names over 63 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::InvalidDefinition(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SchemaError::InvalidDefinition(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::InvalidDefinition(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}
