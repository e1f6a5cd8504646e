//! Row transfer between a [`DataTable`] and a PostgreSQL table.
//!
//! Values cross the wire as text: selects cast every column to `text`,
//! inserts bind text parameters and cast them back to the column type.

use tracing::debug;

use crate::codec;
use crate::core::identifier::validate_identifier;
use crate::core::traits::{Executor, TextRow};
use crate::core::{ColumnDefinition, DataTable, TableDefinition};
use crate::error::{Result, SchemaError};
use crate::typemap::{base_type_name, from_native_type_name};

/// Select rows matching `filter` and append them to `table`.
///
/// Every registered column is read. `filter` is caller-trusted SQL; its
/// `$n` parameters are bound as text. Returns the number of rows added;
/// one undecodable cell leaves the table unchanged.
pub async fn fill_where(
    exec: &dyn Executor,
    table: &mut DataTable,
    filter: &str,
    params: &[Option<String>],
) -> Result<usize> {
    let sql = format!("{} WHERE {}", select_list(table)?, filter);
    let rows = exec.query(&sql, params).await?;
    debug!("{}: fetched {} rows", table.name(), rows.len());
    table.fill_text(&rows)
}

/// Run the `filter` select once per parameter set and append every row.
///
/// All or nothing: if any query or any cell fails, the table is left as it
/// was.
pub async fn fill_batch(
    exec: &dyn Executor,
    table: &mut DataTable,
    filter: &str,
    param_sets: &[Vec<Option<String>>],
) -> Result<usize> {
    let sql = format!("{} WHERE {}", select_list(table)?, filter);
    let rows = collect_rows(exec, &sql, param_sets).await?;
    debug!(
        "{}: fetched {} rows in {} queries",
        table.name(),
        rows.len(),
        param_sets.len()
    );
    table.fill_text(&rows)
}

/// Run an ad-hoc query into a new table typed from the result columns.
///
/// Result columns need distinct names that are valid identifiers and
/// types with a column kind; every column is nullable.
pub async fn query_table(
    exec: &dyn Executor,
    sql: &str,
    params: &[Option<String>],
) -> Result<DataTable> {
    query_table_batch(exec, sql, &[params.to_vec()]).await
}

/// [`query_table`] run once per parameter set into one table. Fails
/// without a table if any run fails.
pub async fn query_table_batch(
    exec: &dyn Executor,
    sql: &str,
    param_sets: &[Vec<Option<String>>],
) -> Result<DataTable> {
    let described = exec.describe(sql).await?;
    let mut table = DataTable::new(TableDefinition::new("query"));
    let mut aliases = Vec::with_capacity(described.len());
    for (i, column) in described.iter().enumerate() {
        let column_type = from_native_type_name(&column.type_name)?;
        table.add_column(ColumnDefinition::new(&column.name, column_type))?;
        aliases.push(format!("c{}", i + 1));
    }
    if aliases.is_empty() {
        return Err(SchemaError::InvalidDefinition(
            "query returns no columns".into(),
        ));
    }

    let cells = aliases
        .iter()
        .map(|a| format!("{}::text", a))
        .collect::<Vec<_>>()
        .join(", ");
    let wrapped = format!(
        "SELECT {} FROM ({}) AS q({})",
        cells,
        sql,
        aliases.join(", ")
    );
    let rows = collect_rows(exec, &wrapped, param_sets).await?;
    table.fill_text(&rows)?;
    Ok(table)
}

/// Run one statement per parameter set, in order, stopping at the first
/// failure. Returns the total affected row count.
pub async fn execute_batch(
    exec: &dyn Executor,
    sql: &str,
    param_sets: &[Vec<Option<String>>],
) -> Result<u64> {
    let mut affected = 0;
    for params in param_sets {
        affected += exec.execute(sql, params).await?;
    }
    debug!("batch of {} statements affected {} rows", param_sets.len(), affected);
    Ok(affected)
}

async fn collect_rows(
    exec: &dyn Executor,
    sql: &str,
    param_sets: &[Vec<Option<String>>],
) -> Result<Vec<TextRow>> {
    let mut rows = Vec::new();
    for params in param_sets {
        rows.extend(exec.query(sql, params).await?);
    }
    Ok(rows)
}

/// Select the row whose primary key equals `ids`, in key order.
pub async fn fill_by_id(
    exec: &dyn Executor,
    table: &mut DataTable,
    ids: &[Option<String>],
) -> Result<usize> {
    let key = &table.definition().primary_key;
    if key.is_empty() {
        return Err(SchemaError::InvalidDefinition(format!(
            "table {} has no primary key",
            table.name()
        )));
    }
    if key.len() != ids.len() {
        return Err(SchemaError::InvalidDefinition(format!(
            "table {}: primary key has {} columns, got {} values",
            table.name(),
            key.len(),
            ids.len()
        )));
    }

    let mut terms = Vec::with_capacity(key.len());
    for (i, name) in key.iter().enumerate() {
        let column = table.definition().column(name).ok_or_else(|| {
            SchemaError::InvalidDefinition(format!("primary key column {} not registered", name))
        })?;
        terms.push(format!("{} = {}", name, placeholder(i + 1, column)));
    }
    fill_where(exec, table, &terms.join(" AND "), ids).await
}

/// Insert every stored row. Returns the number of rows inserted.
pub async fn insert_rows(exec: &dyn Executor, table: &DataTable) -> Result<u64> {
    insert_into(exec, table, table.name()).await
}

async fn insert_into(exec: &dyn Executor, table: &DataTable, target: &str) -> Result<u64> {
    validate_identifier(target)?;
    let columns = table.columns();
    if columns.is_empty() {
        return Err(SchemaError::InvalidDefinition(format!(
            "table {} has no columns",
            table.name()
        )));
    }
    let mut names = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        validate_identifier(&column.name)?;
        names.push(column.name.as_str());
        values.push(placeholder(i + 1, column));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        target,
        names.join(", "),
        values.join(", ")
    );

    let mut inserted = 0;
    for row in table.rows() {
        let params = columns
            .iter()
            .zip(row)
            .map(|(column, cell)| codec::to_param(&column.column_type, cell.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        inserted += exec.execute(&sql, &params).await?;
    }
    debug!("{}: inserted {} rows", target, inserted);
    Ok(inserted)
}

/// Upsert the stored rows into the table by primary key.
///
/// Rows are staged in a temporary table and merged; existing rows are
/// updated and the rest inserted. Returns the number of rows staged.
pub async fn save(exec: &dyn Executor, table: &DataTable) -> Result<u64> {
    let def = table.definition();
    let staging = staging_name(&def.name);
    let columns: Vec<String> = table.column_names().iter().map(|c| c.to_string()).collect();
    let options = MergeOptions {
        dest: &def.name,
        source: &staging,
        columns: &columns,
        primary_key: &def.primary_key,
        auto_remove: false,
        filter: None,
    };
    // Build the merge first so a bad key fails before anything is created.
    let merge = merge_sql(&options)?;

    exec.execute(
        &format!(
            "CREATE TEMPORARY TABLE {} (LIKE {} INCLUDING DEFAULTS)",
            staging, def.name
        ),
        &[],
    )
    .await?;
    let outcome = stage_and_merge(exec, table, &staging, &merge).await;
    // The staging table goes away even when staging or the merge failed.
    let dropped = exec.execute(&format!("DROP TABLE {}", staging), &[]).await;
    let staged = outcome?;
    dropped?;
    Ok(staged)
}

async fn stage_and_merge(
    exec: &dyn Executor,
    table: &DataTable,
    staging: &str,
    merge: &str,
) -> Result<u64> {
    let staged = insert_into(exec, table, staging).await?;
    exec.execute(merge, &[]).await?;
    Ok(staged)
}

fn staging_name(table: &str) -> String {
    const SUFFIX: &str = "_staging";
    let mut end = table.len().min(63 - SUFFIX.len());
    while !table.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &table[..end], SUFFIX)
}

/// Upsert rows from one table into another, matched by primary key.
#[derive(Debug, Clone)]
pub struct MergeOptions<'a> {
    pub dest: &'a str,
    pub source: &'a str,
    /// Columns copied from source to dest; must include the key.
    pub columns: &'a [String],
    pub primary_key: &'a [String],
    /// Delete dest rows whose key is missing from source.
    pub auto_remove: bool,
    /// Limits `auto_remove` to dest rows matching this condition.
    pub filter: Option<&'a str>,
}

/// Build the single merge statement.
///
/// Matching rows are updated through a data-modifying CTE, optionally
/// followed by the delete of dest rows absent from source; rows the update
/// did not touch are then inserted.
pub fn merge_sql(opts: &MergeOptions<'_>) -> Result<String> {
    if opts.primary_key.is_empty() {
        return Err(SchemaError::InvalidDefinition(
            "merge requires primary key columns".into(),
        ));
    }
    if opts.columns.is_empty() {
        return Err(SchemaError::InvalidDefinition(
            "merge requires at least one column".into(),
        ));
    }
    validate_identifier(opts.dest)?;
    validate_identifier(opts.source)?;
    for name in opts.columns.iter().chain(opts.primary_key) {
        validate_identifier(name)?;
    }
    if let Some(missing) = opts.primary_key.iter().find(|k| !opts.columns.contains(*k)) {
        return Err(SchemaError::InvalidDefinition(format!(
            "merge key column {} is not among the merged columns",
            missing
        )));
    }

    let key_match = opts
        .primary_key
        .iter()
        .map(|k| format!("dest.{} = src.{}", k, k))
        .collect::<Vec<_>>()
        .join(" AND ");
    let key_list = opts.primary_key.join(", ");
    let src_keys = prefixed(opts.primary_key, "src.");

    let updates: Vec<String> = opts
        .columns
        .iter()
        .filter(|c| !opts.primary_key.contains(*c))
        .map(|c| format!("{} = src.{}", c, c))
        .collect();

    let updated = if updates.is_empty() {
        format!(
            "SELECT {} FROM {} AS dest JOIN {} AS src USING ({})",
            src_keys, opts.dest, opts.source, key_list
        )
    } else {
        format!(
            "UPDATE {} AS dest SET {} FROM {} AS src WHERE {} RETURNING {}",
            opts.dest,
            updates.join(", "),
            opts.source,
            key_match,
            src_keys
        )
    };

    let mut sql = format!("WITH updated AS ({})", updated);
    if opts.auto_remove {
        let scope = match opts.filter {
            Some(f) if !f.trim().is_empty() => format!("({}) AND ", f),
            _ => String::new(),
        };
        sql.push_str(&format!(
            ", deleted AS (DELETE FROM {} AS dest WHERE {}NOT EXISTS (SELECT 1 FROM {} AS src WHERE {}))",
            opts.dest, scope, opts.source, key_match
        ));
    }
    sql.push_str(&format!(
        " INSERT INTO {} ({}) SELECT {} FROM {} AS src LEFT JOIN updated USING ({}) WHERE updated.{} IS NULL",
        opts.dest,
        opts.columns.join(", "),
        prefixed(opts.columns, "src."),
        opts.source,
        key_list,
        opts.primary_key[0]
    ));
    Ok(sql)
}

/// Run [`merge_sql`]. Returns the number of rows inserted.
pub async fn merge(exec: &dyn Executor, opts: &MergeOptions<'_>) -> Result<u64> {
    let sql = merge_sql(opts)?;
    let inserted = exec.execute(&sql, &[]).await?;
    debug!("merged {} into {}: {} new rows", opts.source, opts.dest, inserted);
    Ok(inserted)
}

fn select_list(table: &DataTable) -> Result<String> {
    validate_identifier(table.name())?;
    if table.column_count() == 0 {
        return Err(SchemaError::InvalidDefinition(format!(
            "table {} has no columns",
            table.name()
        )));
    }
    let mut cells = Vec::with_capacity(table.column_count());
    for column in table.columns() {
        validate_identifier(&column.name)?;
        cells.push(format!("{}::text", column.name));
    }
    Ok(format!("SELECT {} FROM {}", cells.join(", "), table.name()))
}

fn placeholder(n: usize, column: &ColumnDefinition) -> String {
    let ty = &column.column_type;
    format!("${}::text::{}", n, base_type_name(ty.kind, ty.effective_max_size()))
}

fn prefixed(names: &[String], prefix: &str) -> String {
    names
        .iter()
        .map(|n| format!("{}{}", prefix, n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::testing::{row, RecordingExecutor};
    use crate::core::traits::ResultColumn;
    use crate::core::{ColumnKind, ColumnType, TableDefinition, Value};

    fn items() -> DataTable {
        DataTable::new(
            TableDefinition::new("items")
                .with_column(ColumnDefinition::new("id", ColumnType::new(ColumnKind::Int64).required()))
                .with_column(ColumnDefinition::new("name", ColumnType::sized(ColumnKind::String, 40)))
                .with_column(ColumnDefinition::new("tags", ColumnType::new(ColumnKind::StringSlice)))
                .with_primary_key(["id"]),
        )
    }

    #[tokio::test]
    async fn test_fill_where() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["1", "one", "{a}"]), row(&["2", "\\N", "\\N"])]);
        let mut t = items();

        let n = fill_where(&exec, &mut t, "id > $1::text::bigint", &[Some("0".into())])
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(
            exec.executed(),
            vec!["SELECT id::text, name::text, tags::text FROM items WHERE id > $1::text::bigint"]
        );
        assert_eq!(t.value(0, 1), Some(&Value::from("one")));
        assert_eq!(t.value(1, 1), None);
    }

    #[tokio::test]
    async fn test_fill_where_bad_cell_leaves_table_empty() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["1", "one", "\\N"]), row(&["x", "two", "\\N"])]);
        let mut t = items();
        assert!(fill_where(&exec, &mut t, "true", &[]).await.is_err());
        assert_eq!(t.row_count(), 0);
    }

    #[tokio::test]
    async fn test_fill_by_id() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["7", "seven", "\\N"])]);
        let mut t = items();

        fill_by_id(&exec, &mut t, &[Some("7".into())]).await.unwrap();

        assert_eq!(
            exec.executed()[0],
            "SELECT id::text, name::text, tags::text FROM items WHERE id = $1::text::bigint"
        );
        assert_eq!(t.value(0, 0), Some(&Value::Int64(7)));
        assert!(fill_by_id(&exec, &mut t, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fill_batch() {
        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["1", "one", "\\N"])])
            .respond(vec![row(&["2", "two", "{b,c}"])]);
        let mut t = items();

        let n = fill_batch(
            &exec,
            &mut t,
            "id = $1::text::bigint",
            &[vec![Some("1".into())], vec![Some("2".into())]],
        )
        .await
        .unwrap();

        assert_eq!(n, 2);
        assert_eq!(exec.executed().len(), 2);
        assert_eq!(t.value(1, 0), Some(&Value::Int64(2)));
    }

    #[tokio::test]
    async fn test_fill_batch_failure_mid_batch_leaves_table_unfilled() {
        let sets = vec![
            vec![Some("1".into())],
            vec![Some("2".into())],
            vec![Some("3".into())],
        ];

        let exec = RecordingExecutor::failing_on("2");
        exec.respond(vec![row(&["1", "one", "\\N"])]);
        let mut t = items();
        let result = fill_batch(&exec, &mut t, "id = $1::text::bigint", &sets).await;
        assert!(result.is_err());
        assert_eq!(exec.executed().len(), 2);
        assert_eq!(t.row_count(), 0);

        let exec = RecordingExecutor::new();
        exec.respond(vec![row(&["1", "one", "\\N"])])
            .respond(vec![row(&["oops", "two", "\\N"])])
            .respond(vec![row(&["3", "three", "\\N"])]);
        let mut t = items();
        let result = fill_batch(&exec, &mut t, "id = $1::text::bigint", &sets).await;
        assert!(result.is_err());
        assert_eq!(t.row_count(), 0);
    }

    #[tokio::test]
    async fn test_query_table_types_columns_from_result() {
        let exec = RecordingExecutor::new();
        exec.describe_as(vec![
            ResultColumn::new("id", "bigint"),
            ResultColumn::new("label", "text"),
            ResultColumn::new("seen", "timestamp with time zone"),
        ])
        .respond(vec![
            row(&["1", "a", "2024-01-02 03:04:05"]),
            row(&["2", "\\N", "\\N"]),
        ]);

        let t = query_table(&exec, "SELECT id, label, seen FROM log WHERE id < $1", &[Some("9".into())])
            .await
            .unwrap();

        assert_eq!(
            exec.executed(),
            vec![
                "SELECT id, label, seen FROM log WHERE id < $1",
                "SELECT c1::text, c2::text, c3::text FROM (SELECT id, label, seen FROM log WHERE id < $1) AS q(c1, c2, c3)",
            ]
        );
        assert_eq!(t.column_names(), vec!["id", "label", "seen"]);
        assert_eq!(t.columns()[0].column_type.kind, ColumnKind::Int64);
        assert_eq!(t.columns()[2].column_type.kind, ColumnKind::Timestamp);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.value(0, 0), Some(&Value::Int64(1)));
        assert_eq!(t.value(1, 1), None);
    }

    #[tokio::test]
    async fn test_query_table_rejects_unknown_type() {
        let exec = RecordingExecutor::new();
        exec.describe_as(vec![ResultColumn::new("id", "uuid")]);
        let err = query_table(&exec, "SELECT id FROM t", &[]).await.unwrap_err();
        assert!(matches!(err, SchemaError::InvalidType(_)));
        assert_eq!(exec.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_query_table_batch_fails_whole_batch() {
        let exec = RecordingExecutor::new();
        exec.describe_as(vec![ResultColumn::new("n", "bigint")])
            .respond(vec![row(&["1"])])
            .respond(vec![row(&["x"])]);
        let result = query_table_batch(
            &exec,
            "SELECT n FROM t WHERE n = $1::bigint",
            &[vec![Some("1".into())], vec![Some("2".into())]],
        )
        .await;
        assert!(matches!(result, Err(SchemaError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_execute_batch_stops_at_first_failure() {
        let exec = RecordingExecutor::failing_on("DELETE");
        let sets = vec![vec![Some("1".into())], vec![Some("2".into())]];
        assert_eq!(
            execute_batch(&exec, "UPDATE t SET n = $1::text::bigint", &sets)
                .await
                .unwrap(),
            0
        );
        assert!(execute_batch(&exec, "DELETE FROM t WHERE n = $1::text::bigint", &sets)
            .await
            .is_err());
        let statements = exec.statements.lock().unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2].1, vec![Some("1".to_string())]);
    }

    #[tokio::test]
    async fn test_insert_rows_binds_text() {
        let exec = RecordingExecutor::new();
        let mut t = items();
        t.add_values(vec![Some(Value::Int64(1)), None, Some(Value::TextArray(vec![]))])
            .unwrap();

        insert_rows(&exec, &t).await.unwrap();

        let statements = exec.statements.lock().unwrap();
        assert_eq!(
            statements[0].0,
            "INSERT INTO items (id, name, tags) VALUES ($1::text::bigint, $2::text::character varying(40), $3::text::text[])"
        );
        assert_eq!(
            statements[0].1,
            vec![Some("1".to_string()), None, Some("{}".to_string())]
        );
    }

    #[test]
    fn test_merge_sql() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let key = vec!["id".to_string()];
        let opts = MergeOptions {
            dest: "a",
            source: "b",
            columns: &columns,
            primary_key: &key,
            auto_remove: true,
            filter: Some("dest.name <> ''"),
        };
        assert_eq!(
            merge_sql(&opts).unwrap(),
            "WITH updated AS (UPDATE a AS dest SET name = src.name FROM b AS src \
             WHERE dest.id = src.id RETURNING src.id), \
             deleted AS (DELETE FROM a AS dest WHERE (dest.name <> '') AND \
             NOT EXISTS (SELECT 1 FROM b AS src WHERE dest.id = src.id)) \
             INSERT INTO a (id, name) SELECT src.id, src.name FROM b AS src \
             LEFT JOIN updated USING (id) WHERE updated.id IS NULL"
        );
    }

    #[test]
    fn test_merge_sql_key_only() {
        let key = vec!["id".to_string()];
        let opts = MergeOptions {
            dest: "a",
            source: "b",
            columns: &key,
            primary_key: &key,
            auto_remove: false,
            filter: None,
        };
        let sql = merge_sql(&opts).unwrap();
        assert!(sql.starts_with("WITH updated AS (SELECT src.id FROM a AS dest JOIN b AS src USING (id))"));
        assert!(!sql.contains("DELETE"));
    }

    #[test]
    fn test_merge_sql_rejects_missing_key() {
        let columns = vec!["name".to_string()];
        let empty: Vec<String> = vec![];
        let key = vec!["id".to_string()];
        let mut opts = MergeOptions {
            dest: "a",
            source: "b",
            columns: &columns,
            primary_key: &empty,
            auto_remove: false,
            filter: None,
        };
        assert!(merge_sql(&opts).is_err());
        opts.primary_key = &key;
        assert!(merge_sql(&opts).is_err());
    }

    #[tokio::test]
    async fn test_save_stages_and_merges() {
        let exec = RecordingExecutor::new();
        let mut t = items();
        t.add_values(vec![Some(Value::Int64(1)), Some("x".into()), None])
            .unwrap();

        save(&exec, &t).await.unwrap();

        let executed = exec.executed();
        assert_eq!(executed.len(), 4);
        assert_eq!(
            executed[0],
            "CREATE TEMPORARY TABLE items_staging (LIKE items INCLUDING DEFAULTS)"
        );
        assert!(executed[1].starts_with("INSERT INTO items_staging (id, name, tags)"));
        assert!(executed[2].starts_with("WITH updated AS (UPDATE items AS dest"));
        assert_eq!(executed[3], "DROP TABLE items_staging");
    }

    #[tokio::test]
    async fn test_save_drops_staging_after_failed_merge() {
        let exec = RecordingExecutor::failing_on("WITH updated");
        let mut t = items();
        t.add_values(vec![Some(Value::Int64(1)), Some("x".into()), None])
            .unwrap();

        let err = save(&exec, &t).await.unwrap_err();

        assert!(err.statement().unwrap_or_default().starts_with("WITH updated"));
        let executed = exec.executed();
        assert_eq!(executed.len(), 4);
        assert_eq!(executed.last().unwrap(), "DROP TABLE items_staging");
    }

    #[tokio::test]
    async fn test_save_drops_staging_after_failed_insert() {
        let exec = RecordingExecutor::failing_on("INSERT INTO items_staging");
        let mut t = items();
        t.add_values(vec![Some(Value::Int64(1)), Some("x".into()), None])
            .unwrap();

        assert!(save(&exec, &t).await.is_err());

        let executed = exec.executed();
        assert_eq!(executed.len(), 3);
        assert!(!executed.iter().any(|s| s.starts_with("WITH updated")));
        assert_eq!(executed.last().unwrap(), "DROP TABLE items_staging");
    }

    #[test]
    fn test_staging_name_fits() {
        let long = "t".repeat(63);
        assert_eq!(staging_name(&long).len(), 63);
        assert_eq!(staging_name("x"), "x_staging");
    }
}
