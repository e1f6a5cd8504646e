//! [`Executor`] over a tokio-postgres session.

use async_trait::async_trait;
use tokio_postgres::types::{Kind, ToSql, Type};
use tokio_postgres::GenericClient;

use crate::core::traits::{Executor, ResultColumn, TextRow};
use crate::error::{Result, SchemaError};

/// Runs statements on a pooled client or an open transaction.
///
/// Every parameter is sent as `text`; statements cast it where another
/// type is needed. Every result column must be readable as text.
pub struct PgExecutor<'a, C> {
    client: &'a C,
}

impl<'a, C> PgExecutor<'a, C>
where
    C: GenericClient + Sync,
{
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

fn bind(params: &[Option<String>]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Catalog spelling of a wire type, as `format_type` would print it for
/// the kinds the codec reads. Narrower integer and float types widen.
fn catalog_type_name(ty: &Type) -> String {
    let (base, suffix) = match ty.kind() {
        Kind::Array(element) => (element, "[]"),
        _ => (ty, ""),
    };
    let name = match base.name() {
        "bool" => "boolean",
        "int2" | "int4" | "int8" => "bigint",
        "float4" | "float8" | "numeric" => "double precision",
        "text" | "varchar" | "bpchar" | "name" => "text",
        "timestamp" => "timestamp without time zone",
        "timestamptz" => "timestamp with time zone",
        other => other,
    };
    format!("{}{}", name, suffix)
}

#[async_trait]
impl<'a, C> Executor for PgExecutor<'a, C>
where
    C: GenericClient + Sync,
{
    async fn query(&self, sql: &str, params: &[Option<String>]) -> Result<Vec<TextRow>> {
        let rows = self
            .client
            .query(sql, &bind(params))
            .await
            .map_err(|e| SchemaError::engine(sql, params, e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                let cell = row
                    .try_get::<_, Option<String>>(i)
                    .map_err(|e| SchemaError::engine(sql, params, e))?;
                cells.push(cell);
            }
            out.push(cells);
        }
        Ok(out)
    }

    async fn execute(&self, sql: &str, params: &[Option<String>]) -> Result<u64> {
        self.client
            .execute(sql, &bind(params))
            .await
            .map_err(|e| SchemaError::engine(sql, params, e))
    }

    async fn describe(&self, sql: &str) -> Result<Vec<ResultColumn>> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| SchemaError::engine(sql, &[], e))?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| ResultColumn::new(c.name(), catalog_type_name(c.type_())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnKind;
    use crate::typemap::from_native_type_name;

    #[test]
    fn test_catalog_type_name() {
        assert_eq!(catalog_type_name(&Type::INT4), "bigint");
        assert_eq!(catalog_type_name(&Type::VARCHAR), "text");
        assert_eq!(catalog_type_name(&Type::TIMESTAMPTZ), "timestamp with time zone");
        assert_eq!(catalog_type_name(&Type::FLOAT4_ARRAY), "double precision[]");
        assert_eq!(catalog_type_name(&Type::UUID), "uuid");
    }

    #[test]
    fn test_catalog_type_names_parse() {
        let kind = |ty: &Type| from_native_type_name(&catalog_type_name(ty)).map(|t| t.kind);
        assert_eq!(kind(&Type::INT8_ARRAY).unwrap(), ColumnKind::Int64Slice);
        assert_eq!(kind(&Type::JSONB).unwrap(), ColumnKind::Json);
        assert_eq!(kind(&Type::BOOL).unwrap(), ColumnKind::Bool);
        assert!(kind(&Type::UUID).is_err());
    }
}
