//! Engine manifest: what the modeling engine needs besides the table itself.

use std::collections::BTreeMap;

use serde::Serialize;

use caphist_model::{CovariateLevel, HistoryError, ModelFamily, Result};

use crate::table::{FormattedTable, OutputColumn};

/// Terms every engine understands without a matching covariate column.
pub const BUILTIN_TERMS: [&str; 6] = ["time", "Time", "group", "age", "Age", "cohort"];

/// Formula used for parameters without a configured one.
pub const CONSTANT_FORMULA: &str = "~1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineManifest {
    pub family: ModelFamily,
    pub engine: String,
    pub occasions: u32,
    pub collapsed: bool,
    pub record_count: usize,
    pub subject_count: u64,
    pub columns: Vec<OutputColumn>,
    pub subject_covariates: Vec<String>,
    pub occasion_covariates: Vec<String>,
    /// Parameter name to formula.
    pub formulas: BTreeMap<String, String>,
}

/// Describes `table` for the engine.
///
/// Every parameter of the family gets a formula; unconfigured ones are
/// constant.
///
/// # Errors
///
/// `UnknownFormulaTerm` when a formula names neither an emitted covariate nor
/// a built-in term.
pub fn build_manifest(
    table: &FormattedTable,
    formulas: &BTreeMap<String, String>,
) -> Result<EngineManifest> {
    let subject_covariates = table.covariate_names(CovariateLevel::Subject);
    let occasion_covariates = table.covariate_names(CovariateLevel::Occasion);
    for (parameter, formula) in formulas {
        for term in formula_terms(formula) {
            let known = BUILTIN_TERMS.contains(&term.as_str())
                || subject_covariates.contains(&term)
                || occasion_covariates.contains(&term);
            if !known {
                return Err(HistoryError::UnknownFormulaTerm {
                    parameter: parameter.clone(),
                    term,
                });
            }
        }
    }

    let family = table.family();
    let mut resolved: BTreeMap<String, String> = family
        .parameters()
        .iter()
        .map(|parameter| ((*parameter).to_string(), CONSTANT_FORMULA.to_string()))
        .collect();
    resolved.extend(formulas.iter().map(|(k, v)| (k.clone(), v.trim().to_string())));

    Ok(EngineManifest {
        family,
        engine: family.engine_tag().to_string(),
        occasions: table.occasions(),
        collapsed: table.is_collapsed(),
        record_count: table.len(),
        subject_count: table.subject_count(),
        columns: table.columns().to_vec(),
        subject_covariates,
        occasion_covariates,
        formulas: resolved,
    })
}

/// Variable terms of a model formula such as `~sex + time` or `~age*sex`.
///
/// Operators, parentheses and numeric constants (`1`, `0`) are not terms.
pub fn formula_terms(formula: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let pieces = formula.split(|c: char| {
        c.is_whitespace() || matches!(c, '~' | '+' | '-' | '*' | ':' | '(' | ')')
    });
    for piece in pieces {
        if piece.is_empty() || piece.parse::<f64>().is_ok() {
            continue;
        }
        if !terms.iter().any(|term| term == piece) {
            terms.push(piece.to_string());
        }
    }
    terms
}
