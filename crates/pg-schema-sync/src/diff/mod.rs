//! Schema differ.
//!
//! Compares a live table definition with a desired one and produces the
//! ordered list of [`SchemaOp`]s that turns the first into the second. The
//! differ is pure: it never touches the database and never mutates either
//! definition.
//!
//! Ordering matters. The primary key is dropped before any column change
//! that could affect it and recreated after every column change; renames
//! run before other column alterations; a column forced NOT NULL gets its
//! default literal first so existing NULLs do not block the constraint.

use serde::Serialize;
use std::fmt;

use crate::core::kind::ColumnType;
use crate::core::schema::{ColumnDefinition, Comment, TableDefinition};
use crate::core::traits::Dialect;
use crate::error::Result;

/// One DDL step. Each renders to exactly one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    CreateTable {
        temporary: bool,
    },
    DropPrimaryKey {
        constraint: String,
    },
    DropColumn {
        column: String,
    },
    RenameColumn {
        from: String,
        to: String,
    },
    AlterColumnType {
        column: String,
        column_type: ColumnType,
    },
    DropNotNull {
        column: String,
    },
    SetNotNull {
        column: String,
    },
    SetDefault {
        column: String,
        expr: String,
    },
    DropDefault {
        column: String,
    },
    SetColumnComment {
        column: String,
        comment: Comment,
    },
    AddColumn {
        column: String,
        column_type: ColumnType,
        default: Option<String>,
    },
    CreatePrimaryKey {
        columns: Vec<String>,
        constraint: Option<String>,
    },
    DropIndex {
        name: String,
    },
    /// `define` is the complete statement, run verbatim.
    CreateIndex {
        name: String,
        define: String,
    },
    SetIndexComment {
        name: String,
        comment: Comment,
    },
    SetTableComment {
        comment: Comment,
    },
}

impl fmt::Display for SchemaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOp::CreateTable { temporary: true } => write!(f, "CreateTable(temporary)"),
            SchemaOp::CreateTable { temporary: false } => write!(f, "CreateTable"),
            SchemaOp::DropPrimaryKey { constraint } => write!(f, "DropPrimaryKey({})", constraint),
            SchemaOp::DropColumn { column } => write!(f, "DropColumn({})", column),
            SchemaOp::RenameColumn { from, to } => write!(f, "RenameColumn({} -> {})", from, to),
            SchemaOp::AlterColumnType {
                column,
                column_type,
            } => write!(
                f,
                "AlterColumnType({}, {})",
                column,
                crate::typemap::to_native_type_name(column_type)
            ),
            SchemaOp::DropNotNull { column } => write!(f, "DropNotNull({})", column),
            SchemaOp::SetNotNull { column } => write!(f, "SetNotNull({})", column),
            SchemaOp::SetDefault { column, expr } => write!(f, "SetDefault({}, {})", column, expr),
            SchemaOp::DropDefault { column } => write!(f, "DropDefault({})", column),
            SchemaOp::SetColumnComment { column, .. } => write!(f, "SetColumnComment({})", column),
            SchemaOp::AddColumn {
                column,
                column_type,
                ..
            } => write!(
                f,
                "AddColumn({}, {})",
                column,
                crate::typemap::to_native_type_name(column_type)
            ),
            SchemaOp::CreatePrimaryKey { columns, .. } => {
                write!(f, "CreatePrimaryKey({})", columns.join(", "))
            }
            SchemaOp::DropIndex { name } => write!(f, "DropIndex({})", name),
            SchemaOp::CreateIndex { name, .. } => write!(f, "CreateIndex({})", name),
            SchemaOp::SetIndexComment { name, .. } => write!(f, "SetIndexComment({})", name),
            SchemaOp::SetTableComment { .. } => write!(f, "SetTableComment"),
        }
    }
}

/// Ordered operations for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaPlan {
    pub table: String,
    pub ops: Vec<SchemaOp>,
}

impl SchemaPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Render every op into its statement.
    pub fn statements(&self, dialect: &dyn Dialect) -> Result<Vec<String>> {
        self.ops
            .iter()
            .map(|op| dialect.render(&self.table, op))
            .collect()
    }
}

/// Compute the operations that converge `live` to `desired`.
///
/// `live` is `None` when the table does not exist yet; the plan then starts
/// with `CreateTable` and continues as if the table were empty.
pub fn diff(
    dialect: &dyn Dialect,
    live: Option<&TableDefinition>,
    desired: &TableDefinition,
) -> Result<SchemaPlan> {
    desired.validate()?;

    let mut ops = Vec::new();
    let created;
    let live = match live {
        Some(live) => live,
        None => {
            ops.push(SchemaOp::CreateTable {
                temporary: desired.temporary,
            });
            created = desired.empty_like();
            &created
        }
    };

    let key_changed = primary_key_changed(live, desired);
    if key_changed && live.has_primary_key() {
        let constraint = if live.primary_key_constraint.is_empty() {
            format!("{}_pkey", live.name)
        } else {
            live.primary_key_constraint.clone()
        };
        ops.push(SchemaOp::DropPrimaryKey { constraint });
    }

    let pairs = match_columns(live, desired);
    let mut live_used = vec![false; live.columns.len()];
    let mut desired_used = vec![false; desired.columns.len()];
    for &(l, d) in &pairs {
        live_used[l] = true;
        desired_used[d] = true;
    }

    for (column, _) in live.columns.iter().zip(&live_used).filter(|(_, used)| !**used) {
        ops.push(SchemaOp::DropColumn {
            column: column.name.clone(),
        });
    }

    for &(l, d) in &pairs {
        let (old, new) = (&live.columns[l], &desired.columns[d]);
        if old.name != new.name {
            ops.push(SchemaOp::RenameColumn {
                from: old.name.clone(),
                to: new.name.clone(),
            });
        }
    }
    for &(l, d) in &pairs {
        alter_column(dialect, &live.columns[l], &desired.columns[d], &mut ops);
    }

    for (column, _) in desired
        .columns
        .iter()
        .zip(&desired_used)
        .filter(|(_, used)| !**used)
    {
        let default = if !column.default.is_empty() {
            Some(column.default.clone())
        } else if column.column_type.is_not_null() {
            Some(dialect.default_literal(column.column_type.kind))
        } else {
            None
        };
        ops.push(SchemaOp::AddColumn {
            column: column.name.clone(),
            column_type: column.column_type.clone(),
            default,
        });
        if !column.comment.is_empty() {
            ops.push(SchemaOp::SetColumnComment {
                column: column.name.clone(),
                comment: column.comment.clone(),
            });
        }
    }

    if key_changed && desired.has_primary_key() {
        ops.push(SchemaOp::CreatePrimaryKey {
            columns: desired.primary_key.clone(),
            constraint: (!desired.primary_key_constraint.is_empty())
                .then(|| desired.primary_key_constraint.clone()),
        });
    }

    diff_indexes(live, desired, &mut ops);

    if !live.comment.same_as(&desired.comment) {
        ops.push(SchemaOp::SetTableComment {
            comment: desired.comment.clone(),
        });
    }

    Ok(SchemaPlan {
        table: desired.name.clone(),
        ops,
    })
}

/// True when the ordered key column names differ, or any key column's
/// storage type differs.
fn primary_key_changed(live: &TableDefinition, desired: &TableDefinition) -> bool {
    if live.primary_key != desired.primary_key {
        return true;
    }
    desired.primary_key.iter().any(|name| {
        match (live.column(name), desired.column(name)) {
            (Some(old), Some(new)) => !old.column_type.same_storage(&new.column_type),
            _ => true,
        }
    })
}

/// Pair desired columns with live columns: by name first, then by the
/// desired column's prior name. First match wins and each live column is
/// used at most once. Returns `(live_index, desired_index)` in desired order.
fn match_columns(live: &TableDefinition, desired: &TableDefinition) -> Vec<(usize, usize)> {
    let mut used = vec![false; live.columns.len()];
    let mut pairs = Vec::new();

    for (d, column) in desired.columns.iter().enumerate() {
        let find = |name: &str, used: &[bool]| {
            live.columns
                .iter()
                .enumerate()
                .find(|(i, c)| !used[*i] && c.name == name)
                .map(|(i, _)| i)
        };
        let found = find(&column.name, &used)
            .or_else(|| column.rename_source().and_then(|origin| find(origin, &used)));
        if let Some(l) = found {
            used[l] = true;
            pairs.push((l, d));
        }
    }

    pairs
}

fn alter_column(
    dialect: &dyn Dialect,
    old: &ColumnDefinition,
    new: &ColumnDefinition,
    ops: &mut Vec<SchemaOp>,
) {
    let column = &new.name;
    let (old_ty, new_ty) = (&old.column_type, &new.column_type);

    if !old_ty.same_storage(new_ty) {
        ops.push(SchemaOp::AlterColumnType {
            column: column.clone(),
            column_type: new_ty.clone(),
        });
    }
    if old_ty.is_not_null() && !new_ty.is_not_null() {
        ops.push(SchemaOp::DropNotNull {
            column: column.clone(),
        });
    }
    if !old_ty.is_not_null() && new_ty.is_not_null() {
        ops.push(SchemaOp::SetDefault {
            column: column.clone(),
            expr: dialect.default_literal(new_ty.kind),
        });
        ops.push(SchemaOp::SetNotNull {
            column: column.clone(),
        });
    }
    if !old.default.is_empty() && new.default.is_empty() {
        ops.push(SchemaOp::DropDefault {
            column: column.clone(),
        });
    }
    if old.default != new.default && !new.default.is_empty() {
        ops.push(SchemaOp::SetDefault {
            column: column.clone(),
            expr: new.default.clone(),
        });
    }
    if !old.comment.same_as(&new.comment) {
        ops.push(SchemaOp::SetColumnComment {
            column: column.clone(),
            comment: new.comment.clone(),
        });
    }
}

fn diff_indexes(live: &TableDefinition, desired: &TableDefinition, ops: &mut Vec<SchemaOp>) {
    for (name, old) in &live.indexes {
        match desired.indexes.get(name) {
            Some(new) => {
                if old.define != new.define {
                    ops.push(SchemaOp::DropIndex { name: name.clone() });
                    ops.push(SchemaOp::CreateIndex {
                        name: name.clone(),
                        define: new.define.clone(),
                    });
                }
                if !old.comment.same_as(&new.comment) {
                    ops.push(SchemaOp::SetIndexComment {
                        name: name.clone(),
                        comment: new.comment.clone(),
                    });
                }
            }
            None => ops.push(SchemaOp::DropIndex { name: name.clone() }),
        }
    }

    for (name, new) in &desired.indexes {
        if live.indexes.contains_key(name) {
            continue;
        }
        ops.push(SchemaOp::CreateIndex {
            name: name.clone(),
            define: new.define.clone(),
        });
        ops.push(SchemaOp::SetIndexComment {
            name: name.clone(),
            comment: new.comment.clone(),
        });
    }
}
