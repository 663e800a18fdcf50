use std::path::Path;

use csv::ReaderBuilder;

use caphist_model::{HistoryError, Result};

/// A delimited table as read from disk, before typing.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

#[derive(Debug, Clone)]
pub struct CsvRow {
    /// 1-based line number in the source file.
    pub line: u64,
    pub cells: Vec<String>,
}

impl CsvRow {
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

pub(crate) fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    let mut parts = trimmed.split_whitespace();
    let mut normalized = String::new();
    if let Some(first) = parts.next() {
        normalized.push_str(first);
        for part in parts {
            normalized.push(' ');
            normalized.push_str(part);
        }
    }
    normalized
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Reads a delimited file. The first non-blank row is the header row; blank
/// rows are skipped everywhere.
pub fn read_csv_table(path: &Path, delimiter: u8) -> Result<CsvTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|error| csv_error(path, error))?;
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| csv_error(path, error))?;
        let cells: Vec<String> = record.iter().map(normalize_cell).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        if headers.is_none() {
            headers = Some(record.iter().map(normalize_header).collect());
            continue;
        }
        let line = record.position().map_or(0, csv::Position::line);
        rows.push(CsvRow { line, cells });
    }
    Ok(CsvTable {
        headers: headers.unwrap_or_default(),
        rows,
    })
}

fn csv_error(path: &Path, error: csv::Error) -> HistoryError {
    match error.into_kind() {
        csv::ErrorKind::Io(source) => HistoryError::Io {
            path: path.to_path_buf(),
            source,
        },
        csv::ErrorKind::Utf8 { pos, err } => HistoryError::MalformedRecord {
            path: path.to_path_buf(),
            line: pos.as_ref().map_or(0, csv::Position::line),
            column: format!("field {}", err.field() + 1),
            value: String::new(),
            expected: "valid UTF-8 text".to_string(),
        },
        other => HistoryError::MalformedRecord {
            path: path.to_path_buf(),
            line: 0,
            column: String::new(),
            value: String::new(),
            expected: format!("readable delimited text ({other:?})"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_whitespace_is_collapsed() {
        assert_eq!(normalize_header("\u{feff} body   mass "), "body mass");
        assert_eq!(normalize_cell("  7 "), "7");
    }
}
