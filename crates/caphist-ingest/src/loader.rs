//! Typed loading of declared-schema tables.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use caphist_model::{HistoryError, ObservationEvent, Result, SubjectRecord, Value};

use crate::csv_table::{CsvRow, read_csv_table};
use crate::schema::{ResolvedColumns, TableSchema};

/// Loads one [`ObservationEvent`] per data row.
///
/// # Errors
///
/// - `SchemaMismatch` when the schema has no occasion column or a declared
///   column is missing from the header row.
/// - `MalformedRecord` when a cell cannot be parsed to its declared type, a
///   required cell is empty, or the occasion is not a positive integer.
pub fn load_events(path: &Path, schema: &TableSchema) -> Result<Vec<ObservationEvent>> {
    let start = Instant::now();
    let table = read_csv_table(path, schema.delimiter)?;
    let resolved = schema.resolve(&table.headers, path)?;
    let Some(occasion_index) = resolved.occasion else {
        return Err(HistoryError::schema_mismatch(
            path,
            "event tables must declare an occasion column",
        ));
    };
    let mut events = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let subject = parse_subject(path, row, schema, &resolved)?;
        let occasion = parse_occasion(path, row, schema, occasion_index)?;
        let values = parse_values(path, row, &resolved)?;
        events.push(ObservationEvent {
            subject,
            occasion,
            values,
        });
    }
    info!(
        path = %path.display(),
        event_count = events.len(),
        duration_ms = start.elapsed().as_millis(),
        "events loaded"
    );
    Ok(events)
}

/// Loads one [`SubjectRecord`] per data row of a table without occasions.
pub fn load_subject_records(path: &Path, schema: &TableSchema) -> Result<Vec<SubjectRecord>> {
    if let Some(occasion) = &schema.occasion {
        return Err(HistoryError::schema_mismatch(
            path,
            format!("subject-level tables must not declare an occasion column (got '{occasion}')"),
        ));
    }
    let table = read_csv_table(path, schema.delimiter)?;
    let resolved = schema.resolve(&table.headers, path)?;
    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let subject = parse_subject(path, row, schema, &resolved)?;
        let values = parse_values(path, row, &resolved)?;
        records.push(SubjectRecord { subject, values });
    }
    debug!(
        path = %path.display(),
        record_count = records.len(),
        "subject records loaded"
    );
    Ok(records)
}

fn parse_subject(
    path: &Path,
    row: &CsvRow,
    schema: &TableSchema,
    resolved: &ResolvedColumns<'_>,
) -> Result<String> {
    let raw = row.cell(resolved.subject);
    if raw.is_empty() {
        return Err(malformed(path, row, &schema.subject, raw, "a subject identifier"));
    }
    Ok(raw.to_string())
}

fn parse_occasion(path: &Path, row: &CsvRow, schema: &TableSchema, index: usize) -> Result<u32> {
    let raw = row.cell(index);
    let column = schema.occasion.as_deref().unwrap_or_default();
    match raw.parse::<u32>() {
        Ok(occasion) if occasion > 0 => Ok(occasion),
        _ => Err(malformed(path, row, column, raw, "a positive occasion index")),
    }
}

fn parse_values(
    path: &Path,
    row: &CsvRow,
    resolved: &ResolvedColumns<'_>,
) -> Result<BTreeMap<String, Value>> {
    let mut values = BTreeMap::new();
    for (index, spec) in &resolved.values {
        let raw = row.cell(*index);
        if raw.is_empty() {
            if spec.required {
                return Err(malformed(path, row, &spec.name, raw, spec.column_type.describe()));
            }
            continue;
        }
        let value = spec
            .column_type
            .parse(raw)
            .ok_or_else(|| malformed(path, row, &spec.name, raw, spec.column_type.describe()))?;
        values.insert(spec.name.clone(), value);
    }
    Ok(values)
}

fn malformed(path: &Path, row: &CsvRow, column: &str, value: &str, expected: &str) -> HistoryError {
    HistoryError::MalformedRecord {
        path: path.to_path_buf(),
        line: row.line,
        column: column.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
