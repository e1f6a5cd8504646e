//! Typed in-memory table.

use super::kind::ColumnType;
use super::schema::{ColumnDefinition, TableDefinition};
use super::traits::TextRow;
use super::value::{Datum, Nullable, Value};
use crate::codec;
use crate::error::{Result, SchemaError};

/// One stored row; `None` is an absent cell.
pub type Row = Vec<Option<Datum>>;

/// Rows of typed values under a table definition.
///
/// Cells of nullable columns are always stored as [`Datum::Nullable`] and
/// cells of NOT NULL columns as [`Datum::Value`].
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    definition: TableDefinition,
    rows: Vec<Row>,
}

impl DataTable {
    pub fn new(definition: TableDefinition) -> Self {
        Self {
            definition,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.definition.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.definition.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Register another typed column. Existing rows get an empty cell.
    pub fn add_column(&mut self, column: ColumnDefinition) -> Result<usize> {
        let empty = empty_cell(&column.column_type);
        self.definition.add_column(column)?;
        for row in &mut self.rows {
            row.push(empty.clone());
        }
        Ok(self.definition.columns.len() - 1)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.definition.column_index(name)
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDefinition> {
        self.definition.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.definition.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Option<Datum>]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// The present value at a position, if any.
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows
            .get(row)?
            .get(column)?
            .as_ref()
            .and_then(Datum::as_value)
    }

    /// Append a row of cells, checking arity and kinds.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        let row = self.check_row(row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Append a row of plain values; `None` becomes NULL.
    pub fn add_values(&mut self, values: Vec<Option<Value>>) -> Result<()> {
        self.add_row(values.into_iter().map(|v| v.map(Datum::Value)).collect())
    }

    pub fn set_value(&mut self, row: usize, column: usize, value: Option<Value>) -> Result<()> {
        let ty = self.column_type(column)?.clone();
        let cell = normalize_cell(&ty, value.map(Datum::Value))?;
        let slot = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| {
                SchemaError::InvalidDefinition(format!("row {} out of range", row))
            })?;
        *slot = cell;
        Ok(())
    }

    /// Decode text rows and append them. Either every row is appended or,
    /// on the first decode failure, none is.
    pub fn fill_text(&mut self, rows: &[TextRow]) -> Result<usize> {
        let mut staged = Vec::with_capacity(rows.len());
        for text_row in rows {
            if text_row.len() != self.column_count() {
                return Err(self.arity_error(text_row.len()));
            }
            let mut row = Vec::with_capacity(text_row.len());
            for (column, cell) in self.definition.columns.iter().zip(text_row) {
                let text = cell.as_deref().unwrap_or("");
                row.push(codec::decode(&column.column_type, text)?);
            }
            staged.push(row);
        }
        let added = staged.len();
        self.rows.extend(staged);
        Ok(added)
    }

    /// Text form of one row, one entry per column.
    pub fn encode_row(&self, index: usize) -> Result<Vec<String>> {
        let row = self.rows.get(index).ok_or_else(|| {
            SchemaError::InvalidDefinition(format!("row {} out of range", index))
        })?;
        self.definition
            .columns
            .iter()
            .zip(row)
            .map(|(column, cell)| codec::encode(&column.column_type, cell.as_ref()))
            .collect()
    }

    /// Text form of every value in one column.
    pub fn column_strings(&self, column: usize) -> Result<Vec<String>> {
        let ty = self.column_type(column)?;
        self.rows
            .iter()
            .map(|row| codec::encode(ty, row.get(column).and_then(Option::as_ref)))
            .collect()
    }

    /// Tab-separated dump with a header line.
    pub fn as_tab_text(&self) -> Result<String> {
        let mut lines = vec![self.column_names().join("\t")];
        for i in 0..self.rows.len() {
            lines.push(self.encode_row(i)?.join("\t"));
        }
        Ok(lines.join("\n"))
    }

    fn column_type(&self, column: usize) -> Result<&ColumnType> {
        self.definition
            .columns
            .get(column)
            .map(|c| &c.column_type)
            .ok_or_else(|| SchemaError::InvalidDefinition(format!("column {} out of range", column)))
    }

    fn check_row(&self, row: Row) -> Result<Row> {
        if row.len() != self.column_count() {
            return Err(self.arity_error(row.len()));
        }
        self.definition
            .columns
            .iter()
            .zip(row)
            .map(|(column, cell)| normalize_cell(&column.column_type, cell))
            .collect()
    }

    fn arity_error(&self, got: usize) -> SchemaError {
        SchemaError::InvalidDefinition(format!(
            "table {}: row has {} cells, expected {}",
            self.definition.name,
            got,
            self.column_count()
        ))
    }
}

fn empty_cell(ty: &ColumnType) -> Option<Datum> {
    ty.nullable
        .then(|| Datum::Nullable(Nullable::null_of(ty.kind)))
}

/// Bring a cell into the storage form of its column.
fn normalize_cell(ty: &ColumnType, cell: Option<Datum>) -> Result<Option<Datum>> {
    let Some(datum) = cell else {
        return Ok(empty_cell(ty));
    };
    if datum.kind() != ty.kind {
        return Err(SchemaError::InvalidType(format!(
            "value of kind {} stored in {} column",
            datum.kind(),
            ty.kind
        )));
    }
    Ok(match (ty.nullable, datum) {
        (true, Datum::Value(v)) => Some(Datum::Nullable(Nullable::some(v))),
        (true, n @ Datum::Nullable(_)) => Some(n),
        (false, Datum::Nullable(n)) => n.into_option().map(Datum::Value),
        (false, v @ Datum::Value(_)) => Some(v),
    })
}
