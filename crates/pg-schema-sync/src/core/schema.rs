//! Table, column and index definitions.
//!
//! A [`TableDefinition`] describes one table's shape: either the desired
//! shape a caller declares, or the live shape read back from the catalog.
//! Both sides use the same types so the differ can compare them directly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::identifier::validate_identifier;
use super::kind::ColumnType;
use crate::error::{Result, SchemaError};

/// Key under which a plain, non-JSON comment is held.
pub const TEXT_KEY: &str = "text";

/// Structured comment metadata stored in the engine's object comments.
///
/// Comments are JSON objects serialized with sorted keys. A comment that is
/// plain text is kept under the `text` key and serializes back to the same
/// plain text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CommentRepr", into = "String")]
pub struct Comment(BTreeMap<String, serde_json::Value>);

#[derive(Deserialize)]
#[serde(untagged)]
enum CommentRepr {
    Text(String),
    Map(BTreeMap<String, serde_json::Value>),
}

impl From<CommentRepr> for Comment {
    fn from(repr: CommentRepr) -> Self {
        match repr {
            CommentRepr::Text(s) => Comment::parse(&s),
            CommentRepr::Map(map) => Comment(map),
        }
    }
}

impl From<Comment> for String {
    fn from(c: Comment) -> Self {
        c.serialize()
    }
}

impl Comment {
    /// Parse comment text as stored by the engine.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(text) {
            Ok(map) => Comment(map),
            Err(_) => Self::text(text),
        }
    }

    /// Plain-text comment.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut map = BTreeMap::new();
        if !text.is_empty() {
            map.insert(TEXT_KEY.to_string(), serde_json::Value::String(text));
        }
        Comment(map)
    }

    /// Canonical text form. Empty comments serialize to `""`.
    pub fn serialize(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        if self.0.len() == 1 {
            if let Some(serde_json::Value::String(s)) = self.0.get(TEXT_KEY) {
                return s.clone();
            }
        }
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether two comments serialize to the same text.
    pub fn same_as(&self, other: &Comment) -> bool {
        self.serialize() == other.serialize()
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(flatten)]
    pub column_type: ColumnType,

    /// Default expression as SQL text; empty means no default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,

    #[serde(default, skip_serializing_if = "Comment::is_empty")]
    pub comment: Comment,

    /// Name this column had before a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_name: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            default: String::new(),
            comment: Comment::default(),
            origin_name: None,
        }
    }

    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default = expr.into();
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comment = comment;
        self
    }

    /// Mark this column as the renamed successor of `origin`.
    pub fn renamed_from(mut self, origin: impl Into<String>) -> Self {
        self.origin_name = Some(origin.into());
        self
    }

    /// The prior name, when it differs from the current one.
    pub fn rename_source(&self) -> Option<&str> {
        self.origin_name
            .as_deref()
            .filter(|origin| !origin.is_empty() && *origin != self.name)
    }
}

/// One secondary index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Complete `CREATE INDEX` statement, executed verbatim.
    pub define: String,

    #[serde(default, skip_serializing_if = "Comment::is_empty")]
    pub comment: Comment,

    /// Informational, filled by the catalog reader.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,

    /// Informational, filled by the catalog reader.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl IndexDefinition {
    pub fn new(define: impl Into<String>) -> Self {
        Self {
            define: define.into(),
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comment = comment;
        self
    }
}

/// Shape of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,

    /// Primary key column names, in key order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,

    /// Name of the primary key constraint; empty when unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_key_constraint: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, IndexDefinition>,

    #[serde(default, skip_serializing_if = "Comment::is_empty")]
    pub comment: Comment,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A table with this one's name and temporary flag and nothing else.
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            temporary: self.temporary,
            ..Default::default()
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, index: IndexDefinition) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comment = comment;
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Append a column, rejecting duplicate names.
    pub fn add_column(&mut self, column: ColumnDefinition) -> Result<()> {
        validate_identifier(&column.name)?;
        if self.column(&column.name).is_some() {
            return Err(SchemaError::InvalidDefinition(format!(
                "table {}: duplicate column {}",
                self.name, column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the primary key. Every key column must already exist.
    pub fn set_primary_key<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        for name in columns {
            if self.column(name.as_ref()).is_none() {
                return Err(SchemaError::InvalidDefinition(format!(
                    "table {}: primary key column {} does not exist",
                    self.name,
                    name.as_ref()
                )));
            }
        }
        self.primary_key = columns.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(())
    }

    pub fn add_index(&mut self, name: impl Into<String>, index: IndexDefinition) {
        self.indexes.insert(name.into(), index);
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Check structural rules: valid identifiers, unique column names,
    /// primary key columns present, index definitions non-empty.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| SchemaError::InvalidDefinition(format!("table {}: {}", self.name, msg));

        validate_identifier(&self.name)?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier(&column.name)?;
            if let Some(origin) = column.rename_source() {
                validate_identifier(origin)?;
            }
            if !seen.insert(column.name.as_str()) {
                return Err(invalid(format!("duplicate column {}", column.name)));
            }
        }

        let mut key_seen = HashSet::new();
        for key in &self.primary_key {
            if !seen.contains(key.as_str()) {
                return Err(invalid(format!("primary key column {} does not exist", key)));
            }
            if !key_seen.insert(key.as_str()) {
                return Err(invalid(format!("primary key column {} listed twice", key)));
            }
        }
        if !self.primary_key_constraint.is_empty() {
            validate_identifier(&self.primary_key_constraint)?;
        }

        for (name, index) in &self.indexes {
            validate_identifier(name)?;
            if index.define.trim().is_empty() {
                return Err(invalid(format!("index {} has an empty definition", name)));
            }
        }

        Ok(())
    }
}
