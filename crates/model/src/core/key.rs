use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How rows of a batch are addressed when they are deleted from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// No usable index: rows are matched on every column.
    None,
    /// A unique index whose columns are all `NOT NULL`.
    Unique,
    /// Any other BTREE index; deletes are additionally bounded with `ORDER BY .. LIMIT`.
    Secondary,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::None => "none",
            KeyKind::Unique => "unique",
            KeyKind::Secondary => "secondary",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key '{0}' has no columns")]
    NoColumns(String),

    #[error("Key '{name}' lists {columns} columns but {positions} positions")]
    PositionMismatch {
        name: String,
        columns: usize,
        positions: usize,
    },
}

/// The index chosen to paginate and delete a table's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    name: String,
    kind: KeyKind,
    columns: Vec<String>,
    column_positions: Vec<usize>,
}

impl KeyDescriptor {
    /// A keyless descriptor. Deletes fall back to whole-row matching.
    pub fn none() -> Self {
        KeyDescriptor {
            name: String::new(),
            kind: KeyKind::None,
            columns: Vec::new(),
            column_positions: Vec::new(),
        }
    }

    /// Builds a `Unique` or `Secondary` descriptor; `kind` must not be `None`
    /// and `columns` must be non-empty and line up with `column_positions`.
    pub fn indexed(
        name: impl Into<String>,
        kind: KeyKind,
        columns: Vec<String>,
        column_positions: Vec<usize>,
    ) -> Result<Self, KeyError> {
        let name = name.into();
        if kind == KeyKind::None || columns.is_empty() {
            return Err(KeyError::NoColumns(name));
        }
        if columns.len() != column_positions.len() {
            return Err(KeyError::PositionMismatch {
                name,
                columns: columns.len(),
                positions: column_positions.len(),
            });
        }
        Ok(KeyDescriptor {
            name,
            kind,
            columns,
            column_positions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_positions(&self) -> &[usize] {
        &self.column_positions
    }
}

/// Ordered source columns copied by the job. Generated columns are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    pub fn new(columns: Vec<String>) -> Self {
        ColumnSet(columns)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.0.iter().position(|c| c.eq_ignore_ascii_case(column))
    }
}
