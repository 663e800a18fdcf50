//! Raw observation rows as read from a declared-schema table.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }

    /// Interprets the value as a presence flag.
    ///
    /// Numbers are positive when greater than zero; text accepts the usual
    /// field-sheet spellings (`1`, `y`, `yes`, `true`, `t`).
    pub fn is_positive(&self) -> bool {
        match self {
            Self::Integer(v) => *v > 0,
            Self::Number(v) => *v > 0.0,
            Self::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "y" | "yes" | "true" | "t"
            ),
        }
    }

    /// Stable textual rendering used for output columns and grouping keys.
    pub fn render(&self) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Number(v) => format_numeric(*v),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Formats a floating-point number without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// One row of a long-format table: a subject seen (or checked) at an occasion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEvent {
    pub subject: String,
    /// 1-based occasion index.
    pub occasion: u32,
    pub values: BTreeMap<String, Value>,
}

impl ObservationEvent {
    pub fn new(subject: impl Into<String>, occasion: u32) -> Self {
        Self {
            subject: subject.into(),
            occasion,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// True when `name` holds a positive flag value.
    pub fn flag(&self, name: &str) -> bool {
        self.value(name).is_some_and(Value::is_positive)
    }
}

/// One row of a table without an occasion column (subject-level covariates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject: String,
    pub values: BTreeMap<String, Value>,
}

impl SubjectRecord {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert!(Value::Integer(1).is_positive());
        assert!(!Value::Integer(0).is_positive());
        assert!(Value::Number(0.5).is_positive());
        assert!(Value::from("Yes").is_positive());
        assert!(!Value::from("no").is_positive());
    }

    #[test]
    fn numeric_rendering() {
        assert_eq!(Value::Number(2.50).render(), "2.5");
        assert_eq!(Value::Number(3.0).render(), "3");
        assert_eq!(Value::Number(100.0).render(), "100");
        assert_eq!(Value::Integer(-4).render(), "-4");
    }
}
