//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{Result, SchemaError};

pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;
    if db.host.is_empty() {
        return Err(SchemaError::Config("database.host is required".into()));
    }
    if db.database.is_empty() {
        return Err(SchemaError::Config("database.database is required".into()));
    }
    if db.user.is_empty() {
        return Err(SchemaError::Config("database.user is required".into()));
    }
    if db.max_connections == 0 {
        return Err(SchemaError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }
    if let Some(schema) = &db.schema {
        validate_identifier(schema)
            .map_err(|e| SchemaError::Config(format!("database.schema: {}", e)))?;
    }

    let mut names = HashSet::new();
    for table in &config.tables {
        if !names.insert(table.name.as_str()) {
            return Err(SchemaError::Config(format!(
                "table {} is defined more than once",
                table.name
            )));
        }
        table.validate()?;
    }

    Ok(())
}
