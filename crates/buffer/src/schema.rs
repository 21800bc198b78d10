use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BufferError;

/// Identifies a column either by zero-based position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnId {
    Index(usize),
    Name(String),
}

impl From<usize> for ColumnId {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ColumnId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ColumnId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(n) => f.write_str(n),
        }
    }
}

/// Ordered, unique column names fixed at buffer construction.
///
/// Defines both the row width and the name → index mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Builds a schema, rejecting an empty column list or duplicate names.
    pub fn new<I, S>(columns: I) -> Result<Self, BufferError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(BufferError::InvalidSchema(
                "schema must have at least one column".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(BufferError::InvalidSchema(format!(
                    "duplicate column name: {name}"
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Number of columns (the required row width).
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always `false`: construction rejects empty schemas.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of the named column, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolves an identifier to a column position.
    pub fn resolve(&self, id: &ColumnId) -> Result<usize, BufferError> {
        match id {
            ColumnId::Index(index) if *index < self.columns.len() => Ok(*index),
            ColumnId::Index(index) => Err(BufferError::IndexOutOfRange {
                index: *index,
                width: self.columns.len(),
            }),
            ColumnId::Name(name) => self
                .index_of(name)
                .ok_or_else(|| BufferError::UnknownColumn(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_schema() {
        let err = Schema::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, BufferError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::new(["time", "altitude", "time"]).unwrap_err();
        assert_eq!(
            err,
            BufferError::InvalidSchema("duplicate column name: time".into())
        );
    }

    #[test]
    fn resolves_names_and_indexes() {
        let schema = Schema::new(["time", "altitude", "velocity"]).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.resolve(&"velocity".into()).unwrap(), 2);
        assert_eq!(schema.resolve(&0.into()).unwrap(), 0);
    }

    #[test]
    fn resolve_errors() {
        let schema = Schema::new(["time"]).unwrap();
        assert_eq!(
            schema.resolve(&"nonexistent".into()),
            Err(BufferError::UnknownColumn("nonexistent".into()))
        );
        assert_eq!(
            schema.resolve(&ColumnId::Index(1)),
            Err(BufferError::IndexOutOfRange { index: 1, width: 1 })
        );
    }

    #[test]
    fn column_id_from_config_values() {
        let ids: Vec<ColumnId> = serde_json::from_str(r#"[0, "altitude"]"#).unwrap();
        assert_eq!(ids, vec![ColumnId::Index(0), ColumnId::Name("altitude".into())]);
    }
}
