//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::TableDefinition;
use crate::drivers::common::SslMode;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection settings.
    pub database: DatabaseConfig,

    /// Reconciliation behavior.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Desired table definitions.
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Schema placed first on the session's search path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run each `apply` inside one transaction.
    #[serde(default = "default_true")]
    pub transaction: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { transaction: true }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_max_connections() -> usize {
    4
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
