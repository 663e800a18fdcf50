//! Declared table schemas.
//!
//! Every input table is read against a schema declared before loading: which
//! column identifies the subject, which (if any) carries the occasion index,
//! and the type of every value column. Columns not declared are ignored.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use caphist_model::{HistoryError, Result, Value};

/// Declared type of a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Number,
    Text,
    /// `0/1`, `y/n`, `yes/no`, `true/false`; stored as integer 0 or 1.
    Flag,
}

impl ColumnType {
    /// Parses a non-empty, trimmed cell.
    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            Self::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            Self::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Number),
            Self::Text => Some(Value::Text(raw.to_string())),
            Self::Flag => match raw.to_ascii_lowercase().as_str() {
                "1" | "y" | "yes" | "true" | "t" => Some(Value::Integer(1)),
                "0" | "n" | "no" | "false" | "f" => Some(Value::Integer(0)),
                _ => None,
            },
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Text => "text",
            Self::Flag => "a 0/1 flag",
        }
    }
}

fn default_required() -> bool {
    true
}

/// A declared value column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Empty cells are rejected when true, and yield no value when false.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub delimiter: u8,
    pub subject: String,
    pub occasion: Option<String>,
    pub columns: Vec<ColumnSpec>,
}

/// Header positions for every declared column.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedColumns<'a> {
    pub subject: usize,
    pub occasion: Option<usize>,
    pub values: Vec<(usize, &'a ColumnSpec)>,
}

impl TableSchema {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            delimiter: b',',
            subject: subject.into(),
            occasion: None,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_occasion(mut self, occasion: impl Into<String>) -> Self {
        self.occasion = Some(occasion.into());
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Names of the declared value columns, in declaration order.
    pub fn value_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Checks the declaration itself: no empty or repeated column names.
    pub fn validate_declaration(&self, path: &Path) -> Result<()> {
        let mut seen = BTreeSet::new();
        let role_names = std::iter::once(self.subject.as_str()).chain(self.occasion.as_deref());
        let value_names = self.columns.iter().map(|column| column.name.as_str());
        for name in role_names.chain(value_names) {
            if name.trim().is_empty() {
                return Err(HistoryError::schema_mismatch(
                    path,
                    "schema declares an empty column name",
                ));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(HistoryError::schema_mismatch(
                    path,
                    format!("column '{name}' is declared more than once"),
                ));
            }
        }
        Ok(())
    }

    /// Checks that every declared column is present in `headers`.
    pub fn validate_headers(&self, headers: &[String], path: &Path) -> Result<()> {
        self.resolve(headers, path).map(|_| ())
    }

    /// Locates every declared column in `headers`.
    ///
    /// Exact matches win; otherwise a case-insensitive match is accepted. All
    /// missing columns are reported together.
    pub(crate) fn resolve(&self, headers: &[String], path: &Path) -> Result<ResolvedColumns<'_>> {
        self.validate_declaration(path)?;
        if headers.is_empty() {
            return Err(HistoryError::schema_mismatch(path, "file has no header row"));
        }
        let mut missing = Vec::new();
        let mut locate = |name: &str| -> usize {
            match find_header(headers, name) {
                Some(index) => index,
                None => {
                    missing.push(name.to_string());
                    usize::MAX
                }
            }
        };
        let subject = locate(self.subject.as_str());
        let occasion = self.occasion.as_deref().map(&mut locate);
        let values: Vec<(usize, &ColumnSpec)> = self
            .columns
            .iter()
            .map(|column| (locate(column.name.as_str()), column))
            .collect();
        if !missing.is_empty() {
            return Err(HistoryError::schema_mismatch(
                path,
                format!("declared columns not found: {}", missing.join(", ")),
            ));
        }
        Ok(ResolvedColumns {
            subject,
            occasion,
            values,
        })
    }
}

fn find_header(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .or_else(|| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
        })
}
