//! Reads a table's live definition from the engine catalog.

use std::sync::Arc;

use tracing::debug;

use crate::core::schema::{ColumnDefinition, Comment, IndexDefinition, TableDefinition};
use crate::core::traits::{CatalogQuery, Dialect, Executor, TextRow};
use crate::error::{Result, SchemaError};

/// Catalog reader bound to one dialect.
#[derive(Clone)]
pub struct CatalogReader {
    dialect: Arc<dyn Dialect>,
}

impl CatalogReader {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self { dialect }
    }

    /// Load the live definition of `table`.
    ///
    /// The name resolves through the session's search path. Fails with
    /// [`SchemaError::TableNotFound`] when no such table is visible and
    /// with [`SchemaError::InvalidType`] on a column type with no kind.
    pub async fn load(&self, exec: &dyn Executor, table: &str) -> Result<TableDefinition> {
        let params = [Some(table.to_string())];

        let exists = exec
            .query_one(self.sql(CatalogQuery::TableExists), &params)
            .await?;
        if cell(&exists, 0) != "true" {
            return Err(SchemaError::TableNotFound(table.to_string()));
        }

        let mut def = TableDefinition::new(table);

        let comment = exec
            .query_one(self.sql(CatalogQuery::TableComment), &params)
            .await?;
        def.comment = Comment::parse(cell(&comment, 0));

        for row in exec.query(self.sql(CatalogQuery::Columns), &params).await? {
            let mut column_type = self.dialect.parse_native_type(cell(&row, 2))?;
            if cell(&row, 1) == "true" {
                column_type.nullable = false;
            }
            let mut column = ColumnDefinition::new(cell(&row, 0), column_type);
            column.default = cell(&row, 3).to_string();
            column.comment = Comment::parse(cell(&row, 4));
            def.columns.push(column);
        }

        for row in exec.query(self.sql(CatalogQuery::PrimaryKey), &params).await? {
            def.primary_key.push(cell(&row, 0).to_string());
            if def.primary_key_constraint.is_empty() {
                def.primary_key_constraint = cell(&row, 1).to_string();
            }
        }

        for row in exec.query(self.sql(CatalogQuery::Indexes), &params).await? {
            let columns = cell(&row, 3);
            let index = IndexDefinition {
                define: cell(&row, 1).to_string(),
                comment: Comment::parse(cell(&row, 4)),
                unique: cell(&row, 2) == "true",
                columns: if columns.is_empty() {
                    Vec::new()
                } else {
                    columns.split(',').map(str::to_string).collect()
                },
            };
            def.indexes.insert(cell(&row, 0).to_string(), index);
        }

        debug!(
            "Loaded {} from {} catalog: {} columns, {} key columns, {} indexes",
            table,
            self.dialect.name(),
            def.columns.len(),
            def.primary_key.len(),
            def.indexes.len()
        );
        Ok(def)
    }

    fn sql(&self, query: CatalogQuery) -> &'static str {
        self.dialect.catalog_query(query)
    }
}

/// Text of one cell; NULL and missing cells read as `""`.
fn cell(row: &TextRow, index: usize) -> &str {
    row.get(index).and_then(|c| c.as_deref()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kind::ColumnKind;
    use crate::core::traits::testing::{row, RecordingExecutor};
    use crate::drivers::postgres::PostgresDialect;

    fn reader() -> CatalogReader {
        CatalogReader::new(Arc::new(PostgresDialect::new()))
    }

    #[tokio::test]
    async fn test_load_full_table() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["true"])])
            .respond(vec![row(&[r#"{"owner":"ops"}"#])])
            .respond(vec![
                row(&["id", "true", "bigint", "\\N", "\\N"]),
                row(&["email", "false", "character varying(120)", "''::character varying", "login"]),
                row(&["tags", "false", "text[]", "\\N", "\\N"]),
            ])
            .respond(vec![row(&["id", "users_pkey"])])
            .respond(vec![row(&[
                "users_email_idx",
                "CREATE UNIQUE INDEX users_email_idx ON public.users USING btree (email)",
                "true",
                "email",
                "\\N",
            ])]);

        let def = reader().load(&exec, "users").await.unwrap();

        assert_eq!(def.name, "users");
        assert_eq!(def.comment.get("owner").unwrap(), "ops");
        assert_eq!(def.columns.len(), 3);
        assert!(!def.columns[0].column_type.nullable);
        assert_eq!(def.columns[0].column_type.kind, ColumnKind::Int64);
        assert_eq!(def.columns[1].column_type.max_size, 120);
        assert!(def.columns[1].column_type.nullable);
        assert_eq!(def.columns[1].default, "''::character varying");
        assert_eq!(def.columns[1].comment, Comment::text("login"));
        assert_eq!(def.columns[2].column_type.kind, ColumnKind::StringSlice);
        assert_eq!(def.primary_key, vec!["id"]);
        assert_eq!(def.primary_key_constraint, "users_pkey");
        let idx = &def.indexes["users_email_idx"];
        assert!(idx.unique);
        assert_eq!(idx.columns, vec!["email"]);
        assert!(idx.comment.is_empty());

        let executed = exec.executed();
        assert_eq!(executed.len(), 5);
        let statements = exec.statements.lock().unwrap();
        assert!(statements
            .iter()
            .all(|(_, params)| params == &vec![Some("users".to_string())]));
    }

    #[tokio::test]
    async fn test_missing_table() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["false"])]);
        let err = reader().load(&exec, "ghost").await.unwrap_err();
        assert!(matches!(err, SchemaError::TableNotFound(ref t) if t == "ghost"));
        assert_eq!(exec.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_column_type_aborts() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["true"])])
            .respond(vec![row(&["\\N"])])
            .respond(vec![row(&["pos", "false", "point", "\\N", "\\N"])]);
        let err = reader().load(&exec, "shapes").await.unwrap_err();
        assert!(matches!(err, SchemaError::InvalidType(_)));
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let exec = RecordingExecutor::failing_on("pg_attribute");
        exec.respond(vec![row(&["true"])]).respond(vec![row(&["\\N"])]);
        let err = reader().load(&exec, "t").await.unwrap_err();
        assert!(err.statement().unwrap().contains("pg_attribute"));
    }
}
