//! Core types and traits.
//!
//! - [`kind`]: column kinds and type descriptors
//! - [`value`]: typed values and the nullable wrapper
//! - [`schema`]: table, column and index definitions
//! - [`table`]: the typed in-memory [`DataTable`]
//! - [`traits`]: the [`Executor`] and [`Dialect`] seams
//! - [`identifier`]: identifier checks for generated DDL

pub mod identifier;
pub mod kind;
pub mod schema;
pub mod table;
pub mod traits;
pub mod value;

pub use kind::{ColumnKind, ColumnType};
pub use schema::{ColumnDefinition, Comment, IndexDefinition, TableDefinition};
pub use table::{DataTable, Row};
pub use traits::{run_in_transaction, CatalogQuery, Dialect, Executor, ResultColumn, TextRow};
pub use value::{Datum, Nullable, Value};
