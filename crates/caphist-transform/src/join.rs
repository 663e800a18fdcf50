//! Covariate joining.
//!
//! Subject-level tables contribute one value per subject; occasion-level
//! tables are reshaped from long rows into a positional array of length `N`,
//! filled according to [`FillPolicy`] where an occasion has no row. All
//! lookups go through ordered maps, so the result never depends on the order
//! in which rows were supplied.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use caphist_model::columns::is_reserved;
use caphist_model::{
    CovariateSet, CovariateValues, EncounterHistory, FillPolicy, HistoryError, JoinedRecord,
    ObservationEvent, Result, SubjectRecord, UnjoinedPolicy, Value,
};

#[derive(Debug, Clone, Default)]
struct SubjectTable {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<String, BTreeMap<String, Value>>,
    duplicates: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
struct OccasionTable {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<String, BTreeMap<u32, BTreeMap<String, Value>>>,
    /// Lowest repeated occasion per subject.
    duplicates: BTreeMap<String, u32>,
}

/// Covariate tables indexed by subject.
#[derive(Debug, Clone, Default)]
pub struct CovariateSource {
    subject_tables: Vec<SubjectTable>,
    occasion_tables: Vec<OccasionTable>,
}

impl CovariateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a source from a single subject-level table.
    pub fn from_subject_records(
        table: &str,
        columns: &[String],
        records: Vec<SubjectRecord>,
    ) -> Result<Self> {
        let mut source = Self::new();
        source.add_subject_records(table, columns, records)?;
        Ok(source)
    }

    /// Adds a subject-level table carrying `columns`.
    ///
    /// # Errors
    ///
    /// `NameCollision` when a column is a reserved output name or is already
    /// carried by another subject-level table.
    pub fn add_subject_records(
        &mut self,
        table: &str,
        columns: &[String],
        records: Vec<SubjectRecord>,
    ) -> Result<()> {
        for column in columns {
            self.check_declared_name(column, table, |other| {
                other.subject_tables.iter().any(|t| carries(&t.columns, column))
            })?;
        }
        let mut indexed = SubjectTable {
            name: table.to_string(),
            columns: columns.to_vec(),
            ..SubjectTable::default()
        };
        for record in records {
            if indexed.rows.contains_key(&record.subject) {
                indexed.duplicates.insert(record.subject);
                continue;
            }
            let values = record
                .values
                .into_iter()
                .filter(|(name, _)| columns.contains(name))
                .collect();
            indexed.rows.insert(record.subject, values);
        }
        debug!(
            table,
            subject_count = indexed.rows.len(),
            duplicate_count = indexed.duplicates.len(),
            "subject covariates indexed"
        );
        self.subject_tables.push(indexed);
        Ok(())
    }

    /// Adds an occasion-level table carrying `columns`.
    ///
    /// # Errors
    ///
    /// `NameCollision` when a column is a reserved output name or is already
    /// carried by another occasion-level table.
    pub fn add_occasion_events(
        &mut self,
        table: &str,
        columns: &[String],
        events: Vec<ObservationEvent>,
    ) -> Result<()> {
        for column in columns {
            self.check_declared_name(column, table, |other| {
                other.occasion_tables.iter().any(|t| carries(&t.columns, column))
            })?;
        }
        let mut indexed = OccasionTable {
            name: table.to_string(),
            columns: columns.to_vec(),
            ..OccasionTable::default()
        };
        for event in events {
            let by_occasion = indexed.rows.entry(event.subject.clone()).or_default();
            if by_occasion.contains_key(&event.occasion) {
                let lowest = indexed
                    .duplicates
                    .entry(event.subject)
                    .or_insert(event.occasion);
                *lowest = (*lowest).min(event.occasion);
                continue;
            }
            let values = event
                .values
                .into_iter()
                .filter(|(name, _)| columns.contains(name))
                .collect();
            by_occasion.insert(event.occasion, values);
        }
        debug!(
            table,
            subject_count = indexed.rows.len(),
            duplicate_count = indexed.duplicates.len(),
            "occasion covariates indexed"
        );
        self.occasion_tables.push(indexed);
        Ok(())
    }

    fn check_declared_name(
        &self,
        column: &str,
        table: &str,
        already_declared: impl Fn(&Self) -> bool,
    ) -> Result<()> {
        if is_reserved(column) {
            return Err(HistoryError::NameCollision {
                subject: None,
                name: column.to_string(),
                reason: format!("table '{table}' uses a reserved output column name"),
            });
        }
        if already_declared(self) {
            return Err(HistoryError::NameCollision {
                subject: None,
                name: column.to_string(),
                reason: format!("table '{table}' repeats a covariate declared by another table"),
            });
        }
        Ok(())
    }

    /// Subjects with at least one row in a subject-level table.
    pub fn roster(&self) -> BTreeSet<String> {
        self.subject_tables
            .iter()
            .flat_map(|table| table.rows.keys().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subject_tables.is_empty() && self.occasion_tables.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub unjoined: UnjoinedPolicy,
    pub fill: FillPolicy,
}

#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub records: Vec<JoinedRecord>,
    /// Per-subject join failures.
    pub issues: Vec<HistoryError>,
    /// Unjoined subjects removed under [`UnjoinedPolicy::Drop`].
    pub dropped: Vec<HistoryError>,
}

/// Attaches covariates to every history.
///
/// Records keep the order of `histories`.
pub fn join_covariates(
    histories: Vec<EncounterHistory>,
    source: &CovariateSource,
    options: &JoinOptions,
) -> JoinOutcome {
    let span = info_span!("join_covariates", history_count = histories.len());
    let _guard = span.enter();
    let start = Instant::now();

    let mut outcome = JoinOutcome::default();
    for history in histories {
        match join_subject(&history, source, &options.fill) {
            Ok(covariates) => outcome.records.push(JoinedRecord {
                history,
                covariates,
            }),
            Err(error @ HistoryError::UnjoinedSubject { .. })
                if options.unjoined == UnjoinedPolicy::Drop =>
            {
                debug!(subject = %history.subject, "unjoined subject dropped");
                outcome.dropped.push(error);
            }
            Err(error) => {
                warn!(subject = %history.subject, kind = %error.kind(), "join rejected: {error}");
                outcome.issues.push(error);
            }
        }
    }
    info!(
        record_count = outcome.records.len(),
        rejected_count = outcome.issues.len(),
        dropped_count = outcome.dropped.len(),
        duration_ms = start.elapsed().as_millis(),
        "covariates joined"
    );
    outcome
}

fn join_subject(
    history: &EncounterHistory,
    source: &CovariateSource,
    fill: &FillPolicy,
) -> Result<CovariateSet> {
    let subject = history.subject.as_str();
    let mut covariates = CovariateSet::new();

    for table in &source.subject_tables {
        if table.duplicates.contains(subject) {
            return Err(HistoryError::DuplicateSubject {
                subject: subject.to_string(),
                table: table.name.clone(),
            });
        }
        let Some(values) = table.rows.get(subject) else {
            return Err(HistoryError::UnjoinedSubject {
                subject: subject.to_string(),
                table: table.name.clone(),
            });
        };
        for (name, value) in values {
            covariates.insert(name.clone(), CovariateValues::Subject(value.clone()));
        }
    }

    let empty = BTreeMap::new();
    for table in &source.occasion_tables {
        if let Some(&occasion) = table.duplicates.get(subject) {
            return Err(HistoryError::DuplicateOccasion {
                subject: subject.to_string(),
                occasion,
            });
        }
        let rows = table.rows.get(subject).unwrap_or(&empty);
        if let Some((&occasion, _)) = rows.range(history.occasions.saturating_add(1)..).next() {
            return Err(HistoryError::OccasionOutOfRange {
                subject: subject.to_string(),
                occasion,
                occasions: history.occasions,
            });
        }
        for column in &table.columns {
            if covariates
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(column))
            {
                return Err(HistoryError::NameCollision {
                    subject: Some(subject.to_string()),
                    name: column.clone(),
                    reason: "supplied at both subject and occasion level".to_string(),
                });
            }
            let values = occasion_values(subject, column, rows, history.occasions, fill)?;
            covariates.insert(column.clone(), CovariateValues::Occasion(values));
        }
    }
    Ok(covariates)
}

/// Reshapes one occasion-level column into exactly `occasions` values.
/// Engine column names are case-insensitive.
fn carries(columns: &[String], name: &str) -> bool {
    columns.iter().any(|column| column.eq_ignore_ascii_case(name))
}

fn occasion_values(
    subject: &str,
    column: &str,
    rows: &BTreeMap<u32, BTreeMap<String, Value>>,
    occasions: u32,
    fill: &FillPolicy,
) -> Result<Vec<Value>> {
    let mut values: Vec<Value> = Vec::with_capacity(occasions as usize);
    for occasion in 1..=occasions {
        let supplied = rows.get(&occasion).and_then(|row| row.get(column));
        let value = match (supplied, fill) {
            (Some(value), _) => value.clone(),
            (None, FillPolicy::Default(value)) => value.clone(),
            (None, FillPolicy::CarryForward) if !values.is_empty() => {
                values[values.len() - 1].clone()
            }
            (None, FillPolicy::CarryForward | FillPolicy::Fail) => {
                return Err(HistoryError::MissingOccasionCovariate {
                    subject: subject.to_string(),
                    name: column.to_string(),
                    occasion,
                });
            }
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carry_forward_fills_gaps() {
        let mut rows = BTreeMap::new();
        rows.insert(1, BTreeMap::from([("temp".to_string(), Value::Integer(3))]));
        rows.insert(3, BTreeMap::from([("temp".to_string(), Value::Integer(5))]));
        let values = occasion_values("A", "temp", &rows, 4, &FillPolicy::CarryForward).unwrap();
        assert_eq!(
            values,
            vec![Value::Integer(3), Value::Integer(3), Value::Integer(5), Value::Integer(5)]
        );
    }

    #[test]
    fn carry_forward_without_earlier_value_fails() {
        let mut rows = BTreeMap::new();
        rows.insert(2, BTreeMap::from([("temp".to_string(), Value::Integer(3))]));
        let err = occasion_values("A", "temp", &rows, 2, &FillPolicy::CarryForward).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::MissingOccasionCovariate { occasion: 1, .. }
        ));
    }
}
