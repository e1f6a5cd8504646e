//! # pg-schema-sync
//!
//! Typed in-memory tables and declarative schema reconciliation for
//! PostgreSQL.
//!
//! - **Typed tables**: [`DataTable`] rows checked against 13 column kinds
//! - **Text codec**: lossless round trip through PostgreSQL's text format
//! - **Schema diff**: ordered DDL operations from a live and a desired definition
//! - **Catalog reader**: live definitions from `pg_catalog`
//! - **Row transfer**: fill, insert and merge through a [`PgExecutor`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pg_schema_sync::{Config, PgExecutor, PgPool, PostgresDialect, SchemaSync};
//!
//! #[tokio::main]
//! async fn main() -> pg_schema_sync::Result<()> {
//!     let config = Config::load("schema.yaml")?;
//!     let pool = PgPool::connect(&config.database).await?;
//!     let client = pool.get().await?;
//!     let exec = PgExecutor::new(&**client);
//!     let sync = SchemaSync::new(Arc::new(PostgresDialect::new()));
//!     for table in &config.tables {
//!         let plan = sync.reconcile(&exec, table).await?;
//!         println!("{}: {} operations", table.name, plan.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod core;
pub mod diff;
pub mod drivers;
pub mod error;
pub mod sync;
pub mod typemap;

pub use catalog::CatalogReader;
pub use config::{Config, DatabaseConfig, SyncConfig};
pub use crate::core::{
    ColumnDefinition, ColumnKind, ColumnType, Comment, DataTable, Datum, Dialect, Executor,
    IndexDefinition, Nullable, ResultColumn, TableDefinition, Value,
};
pub use crate::core::traits::run_in_transaction;
pub use diff::{diff, SchemaOp, SchemaPlan};
pub use drivers::{PgExecutor, PgPool, PostgresDialect, SslMode};
pub use error::{Result, SchemaError};
pub use sync::SchemaSync;
