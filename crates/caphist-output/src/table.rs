//! The formatted table: flat records in the engine's column layout.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use serde::Serialize;
use tracing::{debug, info};

use caphist_model::columns::{
    FATE_COLUMN, FIRST_FOUND_COLUMN, FREQUENCY_COLUMN, HISTORY_COLUMN, ID_COLUMN,
    LAST_ACTIVE_COLUMN, LAST_CHECKED_COLUMN, occasion_column,
};
use caphist_model::{
    CovariateLevel, CovariateValues, FormattedRecord, HistoryBody, HistoryError, JoinedRecord,
    ModelFamily, Value,
};

use crate::names::{DEFAULT_MAX_NAME_LENGTH, check_column_names};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Merge records with identical history and covariates into one row.
    pub collapse: bool,
    pub max_name_length: usize,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            collapse: false,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnRole {
    Identifier,
    History,
    FirstFound,
    LastActive,
    LastChecked,
    Fate,
    Frequency,
    SubjectCovariate,
    OccasionCovariate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub role: ColumnRole,
    /// Source covariate for covariate columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covariate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occasion: Option<u32>,
}

impl OutputColumn {
    fn fixed(name: &str, role: ColumnRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            covariate: None,
            occasion: None,
        }
    }

    pub fn is_covariate(&self) -> bool {
        matches!(
            self.role,
            ColumnRole::SubjectCovariate | ColumnRole::OccasionCovariate
        )
    }
}

/// One rendered cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell<'a> {
    Text(String),
    Count(i64),
    Value(&'a Value),
    Missing,
}

/// Records ready for the modeling engine, with their column layout fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedTable {
    family: ModelFamily,
    occasions: u32,
    collapsed: bool,
    columns: Vec<OutputColumn>,
    records: Vec<FormattedRecord>,
}

/// Builds the formatted table.
///
/// Column names are checked against `options.max_name_length` before any
/// record is flattened.
///
/// # Errors
///
/// `ColumnNameTooLong` for an over-long name, `NameCollision` when a
/// covariate is attached at different levels across records or two flattened
/// names coincide.
pub fn build_formatted_table(
    joined: Vec<JoinedRecord>,
    family: ModelFamily,
    occasions: u32,
    options: &EmitOptions,
) -> caphist_model::Result<FormattedTable> {
    let levels = covariate_levels(&joined)?;
    let columns = layout_columns(family, occasions, &levels, options.collapse);
    let names: Vec<String> = columns.iter().map(|column| column.name.clone()).collect();
    check_column_names(&names, options.max_name_length)?;

    let input_count = joined.len();
    let records: Vec<FormattedRecord> = joined.into_iter().map(FormattedRecord::from).collect();
    let records = if options.collapse {
        collapse_records(records)
    } else {
        records
    };
    info!(
        family = %family,
        input_count,
        record_count = records.len(),
        column_count = columns.len(),
        collapsed = options.collapse,
        "formatted table built"
    );
    Ok(FormattedTable {
        family,
        occasions,
        collapsed: options.collapse,
        columns,
        records,
    })
}

fn covariate_levels(joined: &[JoinedRecord]) -> caphist_model::Result<BTreeMap<String, CovariateLevel>> {
    let mut levels: BTreeMap<String, CovariateLevel> = BTreeMap::new();
    for record in joined {
        for (name, values) in record.covariates.iter() {
            let level = *levels.entry(name.clone()).or_insert(values.level());
            if level != values.level() {
                return Err(HistoryError::NameCollision {
                    subject: Some(record.history.subject.clone()),
                    name: name.clone(),
                    reason: "attached at different levels across subjects".to_string(),
                });
            }
        }
    }
    Ok(levels)
}

fn layout_columns(
    family: ModelFamily,
    occasions: u32,
    levels: &BTreeMap<String, CovariateLevel>,
    collapse: bool,
) -> Vec<OutputColumn> {
    let mut columns = Vec::new();
    if !collapse {
        columns.push(OutputColumn::fixed(ID_COLUMN, ColumnRole::Identifier));
    }
    if family == ModelFamily::NestSurvival {
        columns.push(OutputColumn::fixed(FIRST_FOUND_COLUMN, ColumnRole::FirstFound));
        columns.push(OutputColumn::fixed(LAST_ACTIVE_COLUMN, ColumnRole::LastActive));
        columns.push(OutputColumn::fixed(LAST_CHECKED_COLUMN, ColumnRole::LastChecked));
        columns.push(OutputColumn::fixed(FATE_COLUMN, ColumnRole::Fate));
    } else {
        columns.push(OutputColumn::fixed(HISTORY_COLUMN, ColumnRole::History));
    }
    columns.push(OutputColumn::fixed(FREQUENCY_COLUMN, ColumnRole::Frequency));

    for (name, level) in levels {
        if *level == CovariateLevel::Subject {
            columns.push(OutputColumn {
                name: name.clone(),
                role: ColumnRole::SubjectCovariate,
                covariate: Some(name.clone()),
                occasion: None,
            });
        }
    }
    for (name, level) in levels {
        if *level == CovariateLevel::Occasion {
            for occasion in 1..=occasions {
                columns.push(OutputColumn {
                    name: occasion_column(name, occasion),
                    role: ColumnRole::OccasionCovariate,
                    covariate: Some(name.clone()),
                    occasion: Some(occasion),
                });
            }
        }
    }
    columns
}

/// Merges records with identical history and covariates, keeping the order
/// in which each group was first seen.
fn collapse_records(records: Vec<FormattedRecord>) -> Vec<FormattedRecord> {
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut collapsed: Vec<FormattedRecord> = Vec::new();
    for record in records {
        let key = format!("{}\u{1d}{}", record.body.key(), record.covariates.key());
        if let Some(&position) = index.get(&key) {
            collapsed[position].frequency += record.frequency;
            continue;
        }
        index.insert(key, collapsed.len());
        collapsed.push(FormattedRecord {
            subject: None,
            ..record
        });
    }
    debug!(group_count = collapsed.len(), "records collapsed");
    collapsed
}

impl FormattedTable {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn occasions(&self) -> u32 {
        self.occasions
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn records(&self) -> &[FormattedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of subjects represented, summing frequencies.
    pub fn subject_count(&self) -> u64 {
        self.records
            .iter()
            .map(|record| u64::from(record.frequency))
            .sum()
    }

    /// Names of covariates emitted at `level`, in column order.
    pub fn covariate_names(&self, level: CovariateLevel) -> Vec<String> {
        let role = match level {
            CovariateLevel::Subject => ColumnRole::SubjectCovariate,
            CovariateLevel::Occasion => ColumnRole::OccasionCovariate,
        };
        let mut names: Vec<String> = Vec::new();
        for column in self.columns.iter().filter(|column| column.role == role) {
            if let Some(name) = &column.covariate
                && names.last() != Some(name)
            {
                names.push(name.clone());
            }
        }
        names
    }

    pub(crate) fn cells<'a>(&self, record: &'a FormattedRecord) -> Vec<Cell<'a>> {
        self.columns
            .iter()
            .map(|column| cell(column, record))
            .collect()
    }

    /// Converts the table to a polars `DataFrame`.
    ///
    /// Covariate columns are `i64` when every value is an integer, `f64` when
    /// every value is numeric, and text otherwise.
    pub fn to_data_frame(&self) -> Result<DataFrame> {
        let rows: Vec<Vec<Cell<'_>>> = self.records.iter().map(|record| self.cells(record)).collect();
        let mut frame_columns: Vec<Column> = Vec::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            let cells: Vec<&Cell<'_>> = rows.iter().map(|row| &row[position]).collect();
            frame_columns.push(frame_column(&column.name, &cells));
        }
        DataFrame::new(frame_columns).context("build formatted dataframe")
    }
}

fn cell<'a>(column: &OutputColumn, record: &'a FormattedRecord) -> Cell<'a> {
    match column.role {
        ColumnRole::Identifier => record
            .subject
            .clone()
            .map_or(Cell::Missing, Cell::Text),
        ColumnRole::History => record
            .body
            .history_string()
            .map_or(Cell::Missing, Cell::Text),
        ColumnRole::FirstFound
        | ColumnRole::LastActive
        | ColumnRole::LastChecked
        | ColumnRole::Fate => match &record.body {
            HistoryBody::Interval(interval) => Cell::Count(match column.role {
                ColumnRole::FirstFound => i64::from(interval.first()),
                ColumnRole::LastActive => i64::from(interval.last_active()),
                ColumnRole::LastChecked => i64::from(interval.last_checked()),
                _ => i64::from(interval.fate()),
            }),
            HistoryBody::Tokens(_) => Cell::Missing,
        },
        ColumnRole::Frequency => Cell::Count(i64::from(record.frequency)),
        ColumnRole::SubjectCovariate | ColumnRole::OccasionCovariate => {
            let values = column
                .covariate
                .as_deref()
                .and_then(|name| record.covariates.get(name));
            let value = match (values, column.occasion) {
                (Some(CovariateValues::Subject(value)), None) => Some(value),
                (Some(CovariateValues::Occasion(values)), Some(occasion)) => {
                    values.get(occasion as usize - 1)
                }
                _ => None,
            };
            value.map_or(Cell::Missing, Cell::Value)
        }
    }
}

fn frame_column(name: &str, cells: &[&Cell<'_>]) -> Column {
    let all_integer = cells.iter().all(|cell| {
        matches!(
            cell,
            Cell::Count(_) | Cell::Missing | Cell::Value(Value::Integer(_))
        )
    });
    let all_numeric = cells.iter().all(|cell| match cell {
        Cell::Count(_) | Cell::Missing => true,
        Cell::Value(value) => value.is_numeric(),
        Cell::Text(_) => false,
    });
    let has_text = cells.iter().any(|cell| matches!(cell, Cell::Text(_)));

    if all_integer && !has_text {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Count(count) => Some(*count),
                Cell::Value(Value::Integer(value)) => Some(*value),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).into_column()
    } else if all_numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Count(count) => Some(*count as f64),
                Cell::Value(value) => value.as_f64(),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).into_column()
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Text(text) => Some(text.clone()),
                Cell::Count(count) => Some(count.to_string()),
                Cell::Value(value) => Some(value.render()),
                Cell::Missing => None,
            })
            .collect();
        Series::new(name.into(), values).into_column()
    }
}
