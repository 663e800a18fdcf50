//! Output column name checks.

use std::collections::BTreeSet;

use caphist_model::{HistoryError, Result};

/// Longest column name the modeling engine accepts unless configured otherwise.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 10;

/// Rejects names longer than `limit` characters and names that appear twice
/// (case-insensitively, as the engine compares them).
pub fn check_column_names(names: &[String], limit: usize) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        let length = name.chars().count();
        if length > limit {
            return Err(HistoryError::ColumnNameTooLong {
                column: name.clone(),
                length,
                limit,
            });
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(HistoryError::NameCollision {
                subject: None,
                name: name.clone(),
                reason: "two output columns share this name".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caphist_model::ErrorKind;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn accepts_names_at_the_limit() {
        assert!(check_column_names(&names(&["id", "ch", "abcdefghij"]), 10).is_ok());
    }

    #[test]
    fn rejects_long_names() {
        let err = check_column_names(&names(&["ch", "temperature1"]), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColumnNameTooLong);
        assert!(err.to_string().contains("temperature1"));
    }

    #[test]
    fn rejects_flattened_clashes() {
        // subject-level "temp1" against occasion-level "temp" at occasion 1
        let err = check_column_names(&names(&["temp1", "temp1"]), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameCollision);
    }
}
