//! Covariates attached to a subject's history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CovariateLevel {
    /// One value per subject.
    Subject,
    /// One value per subject per occasion.
    Occasion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovariateValues {
    Subject(Value),
    /// Positionally aligned with the history tokens.
    Occasion(Vec<Value>),
}

impl CovariateValues {
    pub fn level(&self) -> CovariateLevel {
        match self {
            Self::Subject(_) => CovariateLevel::Subject,
            Self::Occasion(_) => CovariateLevel::Occasion,
        }
    }

    /// Iterate the scalar values in output column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        let slice: &[Value] = match self {
            Self::Subject(value) => std::slice::from_ref(value),
            Self::Occasion(values) => values,
        };
        slice.iter()
    }
}

/// A subject's covariates keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CovariateSet {
    values: BTreeMap<String, CovariateValues>,
}

impl CovariateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Inserts a covariate, returning the previous entry for `name` if one existed.
    pub fn insert(&mut self, name: impl Into<String>, values: CovariateValues) -> Option<CovariateValues> {
        self.values.insert(name.into(), values)
    }

    pub fn get(&self, name: &str) -> Option<&CovariateValues> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CovariateValues)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rendered values in name order; identical sets produce identical keys.
    pub fn key(&self) -> String {
        let mut key = String::new();
        for (name, values) in &self.values {
            key.push_str(name);
            key.push('=');
            for value in values.values() {
                key.push_str(&value.render());
                key.push('\u{1f}');
            }
            key.push('\u{1e}');
        }
        key
    }
}
