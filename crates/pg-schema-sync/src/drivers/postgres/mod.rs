//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: DDL rendering and catalog SQL
//! - [`PgExecutor`]: [`Executor`](crate::core::Executor) over a client or transaction
//! - [`PgPool`]: deadpool-postgres pool with TLS
//! - [`data`]: row transfer between a `DataTable` and a table

pub mod data;
mod dialect;
mod executor;
mod pool;

pub use data::{
    execute_batch, fill_batch, fill_by_id, fill_where, insert_rows, merge, merge_sql,
    query_table, query_table_batch, save, MergeOptions,
};
pub use dialect::{escape_literal, PostgresDialect};
pub use executor::PgExecutor;
pub use pool::PgPool;
