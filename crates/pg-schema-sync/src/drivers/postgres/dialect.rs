//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Renders schema operations as PostgreSQL DDL and supplies the catalog
//! queries used to read a table's live definition.

use crate::core::identifier::validate_identifier;
use crate::core::kind::{ColumnKind, ColumnType};
use crate::core::schema::Comment;
use crate::core::traits::{CatalogQuery, Dialect};
use crate::diff::SchemaOp;
use crate::error::{Result, SchemaError};
use crate::typemap;

/// Restricts catalog lookups to ordinary and partitioned tables visible on
/// the session's search path, which includes its temporary schema.
macro_rules! visible_table {
    () => {
        "c.relname = $1::text AND c.relkind IN ('r', 'p') AND pg_catalog.pg_table_is_visible(c.oid)"
    };
}

const TABLE_EXISTS_SQL: &str = concat!(
    "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_class c WHERE ",
    visible_table!(),
    ")::text"
);

const TABLE_COMMENT_SQL: &str = concat!(
    "SELECT pg_catalog.obj_description(c.oid, 'pg_class') FROM pg_catalog.pg_class c WHERE ",
    visible_table!()
);

const COLUMNS_SQL: &str = concat!(
    "SELECT a.attname::text, a.attnotnull::text, ",
    "pg_catalog.format_type(a.atttypid, a.atttypmod), ",
    "pg_catalog.pg_get_expr(d.adbin, d.adrelid), ",
    "pg_catalog.col_description(a.attrelid, a.attnum) ",
    "FROM pg_catalog.pg_attribute a ",
    "JOIN pg_catalog.pg_class c ON c.oid = a.attrelid ",
    "LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum ",
    "WHERE ",
    visible_table!(),
    " AND a.attnum > 0 AND NOT a.attisdropped ",
    "ORDER BY a.attnum"
);

const PRIMARY_KEY_SQL: &str = concat!(
    "SELECT a.attname::text, con.conname::text ",
    "FROM pg_catalog.pg_constraint con ",
    "JOIN pg_catalog.pg_class c ON c.oid = con.conrelid ",
    "JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY (con.conkey) ",
    "WHERE ",
    visible_table!(),
    " AND con.contype = 'p' ",
    "ORDER BY pg_catalog.array_position(con.conkey, a.attnum)"
);

const INDEXES_SQL: &str = concat!(
    "SELECT i.relname::text, pg_catalog.pg_get_indexdef(ix.indexrelid), ix.indisunique::text, ",
    "(SELECT pg_catalog.string_agg(a.attname::text, ',' ORDER BY k.ord) ",
    "FROM pg_catalog.unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) ",
    "JOIN pg_catalog.pg_attribute a ON a.attrelid = ix.indrelid AND a.attnum = k.attnum), ",
    "pg_catalog.obj_description(ix.indexrelid, 'pg_class') ",
    "FROM pg_catalog.pg_index ix ",
    "JOIN pg_catalog.pg_class c ON c.oid = ix.indrelid ",
    "JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid ",
    "WHERE ",
    visible_table!(),
    " AND NOT ix.indisprimary ",
    "ORDER BY i.relname"
);

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn native_type_name(&self, ty: &ColumnType) -> String {
        typemap::to_native_type_name(ty)
    }

    fn parse_native_type(&self, name: &str) -> Result<ColumnType> {
        typemap::from_native_type_name(name)
    }

    fn default_literal(&self, kind: ColumnKind) -> String {
        typemap::default_literal(kind).to_string()
    }

    fn render(&self, table: &str, op: &SchemaOp) -> Result<String> {
        let t = ident(table)?;
        let sql = match op {
            SchemaOp::CreateTable { temporary } => {
                let temp = if *temporary { "TEMPORARY " } else { "" };
                format!("CREATE {}TABLE {} ()", temp, t)
            }
            SchemaOp::DropPrimaryKey { constraint } => {
                format!("ALTER TABLE {} DROP CONSTRAINT {}", t, ident(constraint)?)
            }
            SchemaOp::DropColumn { column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", t, ident(column)?)
            }
            SchemaOp::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                t,
                ident(from)?,
                ident(to)?
            ),
            SchemaOp::AlterColumnType {
                column,
                column_type,
            } => {
                // NOT NULL is not part of a type change; it has its own ops.
                let c = ident(column)?;
                let base = typemap::base_type_name(column_type.kind, column_type.effective_max_size());
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                    t, c, base, c, base
                )
            }
            SchemaOp::DropNotNull { column } => {
                format!("ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL", t, ident(column)?)
            }
            SchemaOp::SetNotNull { column } => {
                format!("ALTER TABLE {} ALTER COLUMN {} SET NOT NULL", t, ident(column)?)
            }
            SchemaOp::SetDefault { column, expr } => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                t,
                ident(column)?,
                expr
            ),
            SchemaOp::DropDefault { column } => {
                format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", t, ident(column)?)
            }
            SchemaOp::SetColumnComment { column, comment } => format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                t,
                ident(column)?,
                comment_literal(comment)?
            ),
            SchemaOp::AddColumn {
                column,
                column_type,
                default,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    t,
                    ident(column)?,
                    self.native_type_name(column_type)
                );
                if let Some(expr) = default {
                    sql.push_str(" DEFAULT ");
                    sql.push_str(expr);
                }
                sql
            }
            SchemaOp::CreatePrimaryKey {
                columns,
                constraint,
            } => {
                let cols = columns
                    .iter()
                    .map(|c| ident(c))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                match constraint {
                    Some(name) => format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                        t,
                        ident(name)?,
                        cols
                    ),
                    None => format!("ALTER TABLE {} ADD PRIMARY KEY ({})", t, cols),
                }
            }
            SchemaOp::DropIndex { name } => format!("DROP INDEX IF EXISTS {}", ident(name)?),
            SchemaOp::CreateIndex { name, define } => {
                ident(name)?;
                define.clone()
            }
            SchemaOp::SetIndexComment { name, comment } => format!(
                "COMMENT ON INDEX {} IS {}",
                ident(name)?,
                comment_literal(comment)?
            ),
            SchemaOp::SetTableComment { comment } => {
                format!("COMMENT ON TABLE {} IS {}", t, comment_literal(comment)?)
            }
        };
        Ok(sql)
    }

    fn catalog_query(&self, query: CatalogQuery) -> &'static str {
        match query {
            CatalogQuery::TableExists => TABLE_EXISTS_SQL,
            CatalogQuery::TableComment => TABLE_COMMENT_SQL,
            CatalogQuery::Columns => COLUMNS_SQL,
            CatalogQuery::PrimaryKey => PRIMARY_KEY_SQL,
            CatalogQuery::Indexes => INDEXES_SQL,
        }
    }
}

fn ident(name: &str) -> Result<&str> {
    validate_identifier(name)?;
    Ok(name)
}

fn comment_literal(comment: &Comment) -> Result<String> {
    let text = comment.serialize();
    if text.is_empty() {
        Ok("NULL".to_string())
    } else {
        escape_literal(&text)
    }
}

/// Quote text as an escape-string constant (`E'...'`).
///
/// NUL cannot be stored in PostgreSQL text, so text containing one is
/// rejected.
pub fn escape_literal(value: &str) -> Result<String> {
    if let Some(at) = value.find('\0') {
        return Err(SchemaError::InvalidDefinition(format!(
            "literal contains a NUL character at byte {}",
            at
        )));
    }
    let mut out = String::with_capacity(value.len() + 3);
    out.push_str("E'");
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x80 => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(op: SchemaOp) -> String {
        PostgresDialect::new().render("t", &op).unwrap()
    }

    #[test]
    fn test_escape_literal() {
        let lit = |s: &str| escape_literal(s).unwrap();
        assert_eq!(lit("plain"), "E'plain'");
        assert_eq!(lit("it's"), r"E'it\'s'");
        assert_eq!(lit(r"a\b"), r"E'a\\b'");
        assert_eq!(lit("l1\nl2\tx\r"), r"E'l1\nl2\tx\r'");
        assert_eq!(lit("bell\u{7}"), r"E'bell\x07'");
        assert_eq!(lit("ünïcode"), "E'ünïcode'");
    }

    #[test]
    fn test_escape_literal_rejects_nul() {
        assert!(matches!(
            escape_literal("nul\0byte"),
            Err(SchemaError::InvalidDefinition(_))
        ));
        let op = SchemaOp::SetTableComment {
            comment: Comment::text("a\0b"),
        };
        assert!(PostgresDialect::new().render("t", &op).is_err());
    }

    #[test]
    fn test_table_statements() {
        assert_eq!(render(SchemaOp::CreateTable { temporary: false }), "CREATE TABLE t ()");
        assert_eq!(
            render(SchemaOp::CreateTable { temporary: true }),
            "CREATE TEMPORARY TABLE t ()"
        );
        assert_eq!(
            render(SchemaOp::SetTableComment {
                comment: Comment::text("it's here")
            }),
            r"COMMENT ON TABLE t IS E'it\'s here'"
        );
        assert_eq!(
            render(SchemaOp::SetTableComment {
                comment: Comment::default()
            }),
            "COMMENT ON TABLE t IS NULL"
        );
    }

    #[test]
    fn test_column_statements() {
        assert_eq!(
            render(SchemaOp::AddColumn {
                column: "n".into(),
                column_type: ColumnType::new(ColumnKind::Int64).required(),
                default: Some("0".into()),
            }),
            "ALTER TABLE t ADD COLUMN n bigint NOT NULL DEFAULT 0"
        );
        assert_eq!(
            render(SchemaOp::AddColumn {
                column: "tags".into(),
                column_type: ColumnType::sized(ColumnKind::StringSlice, 16),
                default: None,
            }),
            "ALTER TABLE t ADD COLUMN tags character varying(16)[]"
        );
        assert_eq!(
            render(SchemaOp::AlterColumnType {
                column: "id".into(),
                column_type: ColumnType::sized(ColumnKind::String, 50).required(),
            }),
            "ALTER TABLE t ALTER COLUMN id TYPE character varying(50) USING id::character varying(50)"
        );
        assert_eq!(
            render(SchemaOp::RenameColumn {
                from: "a".into(),
                to: "b".into()
            }),
            "ALTER TABLE t RENAME COLUMN a TO b"
        );
        assert_eq!(
            render(SchemaOp::DropColumn { column: "a".into() }),
            "ALTER TABLE t DROP COLUMN a"
        );
        assert_eq!(
            render(SchemaOp::DropNotNull { column: "a".into() }),
            "ALTER TABLE t ALTER COLUMN a DROP NOT NULL"
        );
        assert_eq!(
            render(SchemaOp::SetDefault {
                column: "ts".into(),
                expr: "now()".into()
            }),
            "ALTER TABLE t ALTER COLUMN ts SET DEFAULT now()"
        );
        assert_eq!(
            render(SchemaOp::DropDefault { column: "ts".into() }),
            "ALTER TABLE t ALTER COLUMN ts DROP DEFAULT"
        );
        let mut comment = Comment::default();
        comment.set("unit", "cm");
        assert_eq!(
            render(SchemaOp::SetColumnComment {
                column: "h".into(),
                comment
            }),
            r#"COMMENT ON COLUMN t.h IS E'{"unit":"cm"}'"#
        );
    }

    #[test]
    fn test_key_and_index_statements() {
        assert_eq!(
            render(SchemaOp::DropPrimaryKey {
                constraint: "t_pkey".into()
            }),
            "ALTER TABLE t DROP CONSTRAINT t_pkey"
        );
        assert_eq!(
            render(SchemaOp::CreatePrimaryKey {
                columns: vec!["a".into(), "b".into()],
                constraint: None
            }),
            "ALTER TABLE t ADD PRIMARY KEY (a, b)"
        );
        assert_eq!(
            render(SchemaOp::CreatePrimaryKey {
                columns: vec!["a".into()],
                constraint: Some("t_pk".into())
            }),
            "ALTER TABLE t ADD CONSTRAINT t_pk PRIMARY KEY (a)"
        );
        assert_eq!(render(SchemaOp::DropIndex { name: "i".into() }), "DROP INDEX IF EXISTS i");
        assert_eq!(
            render(SchemaOp::CreateIndex {
                name: "i".into(),
                define: "CREATE INDEX i ON t USING btree (a)".into()
            }),
            "CREATE INDEX i ON t USING btree (a)"
        );
        assert_eq!(
            render(SchemaOp::SetIndexComment {
                name: "i".into(),
                comment: Comment::text("x")
            }),
            "COMMENT ON INDEX i IS E'x'"
        );
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let dialect = PostgresDialect::new();
        assert!(dialect
            .render("", &SchemaOp::CreateTable { temporary: false })
            .is_err());
        assert!(dialect
            .render("t", &SchemaOp::DropColumn { column: "a\0".into() })
            .is_err());
    }

    #[test]
    fn test_catalog_queries_are_parameterized() {
        let dialect = PostgresDialect::new();
        for q in [
            CatalogQuery::TableExists,
            CatalogQuery::TableComment,
            CatalogQuery::Columns,
            CatalogQuery::PrimaryKey,
            CatalogQuery::Indexes,
        ] {
            let sql = dialect.catalog_query(q);
            assert!(sql.contains("$1::text"), "{:?}", q);
            assert!(sql.contains("pg_table_is_visible"), "{:?}", q);
        }
    }
}
