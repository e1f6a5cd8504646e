//! PostgreSQL connection pool.

use std::time::{Duration, Instant};

use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::drivers::common::TlsBuilder;
use crate::error::{Result, SchemaError};

/// Pool of PostgreSQL sessions built from [`DatabaseConfig`].
pub struct PgPool {
    pool: Pool,
    config: DatabaseConfig,
}

impl PgPool {
    /// Build the pool and check one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        pg_config.application_name("pg-schema-sync");
        if let Some(schema) = &config.schema {
            pg_config.options(&format!("-c search_path={}", schema));
        }

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::new(config.ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SchemaError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SchemaError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let pool = Self {
            pool,
            config: config.clone(),
        };
        pool.ping().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(pool)
    }

    pub async fn get(&self) -> Result<Client> {
        self.pool
            .get()
            .await
            .map_err(|e| SchemaError::pool(e, "getting PostgreSQL connection"))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Round-trip `SELECT 1` and return the latency.
    pub async fn ping(&self) -> Result<Duration> {
        let client = self.get().await?;
        let start = Instant::now();
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SchemaError::engine("SELECT 1", &[], e))?;
        Ok(start.elapsed())
    }

    /// Server version string.
    pub async fn server_version(&self) -> Result<String> {
        let client = self.get().await?;
        let row = client
            .query_one("SELECT pg_catalog.version()", &[])
            .await
            .map_err(|e| SchemaError::engine("SELECT pg_catalog.version()", &[], e))?;
        row.try_get::<_, String>(0)
            .map_err(|e| SchemaError::engine("SELECT pg_catalog.version()", &[], e))
    }
}
