//! Core traits at the seams between schema logic and the database.
//!
//! - [`Executor`]: runs SQL with text parameters and returns text rows
//! - [`Dialect`]: engine-specific DDL rendering, type names and catalog SQL
//!
//! Schema reconciliation only ever talks to these traits, so the differ
//! and the emitter can be tested against an in-memory executor.

use std::future::Future;

use async_trait::async_trait;
use tracing::warn;

use super::kind::{ColumnKind, ColumnType};
use crate::diff::SchemaOp;
use crate::error::{Result, SchemaError};

/// One result row with every cell in text form; `None` is SQL NULL.
pub type TextRow = Vec<Option<String>>;

/// A column of a query result as the engine describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    /// Type name in the engine's catalog spelling.
    pub type_name: String,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Runs statements against a database session.
///
/// Parameters and result cells travel as text. Implementations bound to an
/// open transaction run every statement inside it.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a query and collect every row.
    async fn query(&self, sql: &str, params: &[Option<String>]) -> Result<Vec<TextRow>>;

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str, params: &[Option<String>]) -> Result<u64>;

    /// Result columns of a query, in order, without running it.
    async fn describe(&self, sql: &str) -> Result<Vec<ResultColumn>>;

    /// Run a query that must return at least one row; extra rows are ignored.
    async fn query_one(&self, sql: &str, params: &[Option<String>]) -> Result<TextRow> {
        self.query(sql, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SchemaError::NoRecord {
                statement: sql.to_string(),
                params: params.to_vec(),
            })
    }
}

/// Run `work` between `BEGIN` and `COMMIT` on `exec`.
///
/// `work` must use the same executor. When it fails the transaction is
/// rolled back and its error returned; a failed rollback is only logged.
pub async fn run_in_transaction<T, F, Fut>(exec: &dyn Executor, work: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    exec.execute("BEGIN", &[]).await?;
    match work().await {
        Ok(value) => {
            exec.execute("COMMIT", &[]).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = exec.execute("ROLLBACK", &[]).await {
                warn!("Rollback failed: {}", rb);
            }
            Err(e)
        }
    }
}

/// Catalog lookups a dialect provides SQL for. Each takes the table name
/// as its only parameter and returns text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogQuery {
    /// One row: `exists`.
    TableExists,
    /// One row: `comment`.
    TableComment,
    /// Rows in physical order: `name, not_null, type, default, comment`.
    Columns,
    /// Rows in key order: `column, constraint`.
    PrimaryKey,
    /// Rows: `name, define, unique, columns, comment`.
    Indexes,
}

/// SQL syntax strategy for one database engine.
pub trait Dialect: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Column type spelling including the NOT NULL clause.
    fn native_type_name(&self, ty: &ColumnType) -> String;

    /// Parse a type name as the engine's catalog reports it.
    fn parse_native_type(&self, name: &str) -> Result<ColumnType>;

    /// Default expression used when a column is forced NOT NULL.
    fn default_literal(&self, kind: ColumnKind) -> String;

    /// Render one schema operation on `table` as exactly one statement.
    fn render(&self, table: &str, op: &SchemaOp) -> Result<String>;

    /// Catalog SQL for a lookup.
    fn catalog_query(&self, query: CatalogQuery) -> &'static str;
}
