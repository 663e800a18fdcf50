//! Records flowing out of the joiner and into the emitter.

use serde::{Deserialize, Serialize};

use crate::covariate::CovariateSet;
use crate::history::{EncounterHistory, HistoryBody};

/// A history with its covariates attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub history: EncounterHistory,
    pub covariates: CovariateSet,
}

/// Terminal record consumed by the modeling engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedRecord {
    /// Informational only; absent for collapsed groups.
    pub subject: Option<String>,
    pub body: HistoryBody,
    /// Number of subjects sharing this record; always at least 1.
    pub frequency: u32,
    pub covariates: CovariateSet,
}

impl From<JoinedRecord> for FormattedRecord {
    fn from(record: JoinedRecord) -> Self {
        Self {
            subject: Some(record.history.subject),
            body: record.history.body,
            frequency: 1,
            covariates: record.covariates,
        }
    }
}
