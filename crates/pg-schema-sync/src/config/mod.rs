//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::core::TableDefinition;
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Desired definition by table name.
    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl DatabaseConfig {
    /// Connection string in libpq key/value form, password omitted.
    pub fn display_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} sslmode={}",
            self.host, self.port, self.database, self.user, self.ssl_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnKind;
    use crate::drivers::common::SslMode;
    use crate::error::SchemaError;

    const YAML: &str = r#"
database:
  host: localhost
  database: app
  user: app
  password: secret
  ssl_mode: require
tables:
  - name: users
    columns:
      - name: id
        type: int64
        nullable: false
      - name: email
        type: string
        max_size: 120
        comment: "login address"
    primary_key: [id]
    indexes:
      users_email_idx:
        define: CREATE UNIQUE INDEX users_email_idx ON public.users USING btree (email)
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.ssl_mode, SslMode::Require);
        assert!(config.sync.transaction);

        let users = config.table("users").unwrap();
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.columns[1].column_type.kind, ColumnKind::String);
        assert_eq!(users.columns[1].column_type.max_size, 120);
        assert_eq!(users.primary_key, vec!["id"]);
        assert!(users.indexes.contains_key("users_email_idx"));
        assert!(config.table("missing").is_none());
    }

    #[test]
    fn test_from_yaml_rejects_bad_ssl_mode() {
        let yaml = YAML.replace("ssl_mode: require", "ssl_mode: prefer");
        assert!(matches!(Config::from_yaml(&yaml), Err(SchemaError::Yaml(_))));
    }

    #[test]
    fn test_display_string_omits_password() {
        let config = Config::from_yaml(YAML).unwrap();
        let s = config.database.display_string();
        assert!(s.contains("sslmode=require"));
        assert!(!s.contains("secret"));
    }
}
