//! Data model for encounter-history preparation.
//!
//! - **event**: typed observation rows read from declared-schema tables
//! - **family**: model families and the event columns they read
//! - **history**: per-subject token sequences and nest intervals
//! - **covariate**: subject-level and occasion-level covariates
//! - **record**: joined and formatted records
//! - **report**: run accounting and per-subject issues
//! - **error**: the shared error taxonomy

pub mod columns;
pub mod covariate;
pub mod error;
pub mod event;
pub mod family;
pub mod history;
pub mod options;
pub mod record;
pub mod report;

pub use covariate::{CovariateLevel, CovariateSet, CovariateValues};
pub use error::{ErrorKind, HistoryError, Result};
pub use event::{ObservationEvent, SubjectRecord, Value, format_numeric};
pub use family::{FamilyLayout, ModelFamily};
pub use history::{EncounterHistory, HistoryBody, NestInterval, Token};
pub use options::{FillPolicy, SubjectErrorPolicy, UnjoinedPolicy};
pub use record::{FormattedRecord, JoinedRecord};
pub use report::{Disposition, PipelineStage, RunReport, SubjectIssue};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts() {
        let mut report = RunReport::default();
        report.push(
            PipelineStage::Build,
            &HistoryError::DuplicateOccasion {
                subject: "A".to_string(),
                occasion: 2,
            },
            Disposition::Excluded,
        );
        report.push(
            PipelineStage::Join,
            &HistoryError::UnjoinedSubject {
                subject: "B".to_string(),
                table: "morph".to_string(),
            },
            Disposition::Failed,
        );
        assert_eq!(report.excluded_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.is_aborted());
        assert_eq!(report.counts_by_kind().get(&ErrorKind::UnjoinedSubject), Some(&1));
    }

    #[test]
    fn report_serializes() {
        let report = RunReport {
            events_read: 4,
            subjects_seen: 2,
            ..RunReport::default()
        };
        let json = serde_json::to_string(&report).expect("serialize report");
        let round: RunReport = serde_json::from_str(&json).expect("deserialize report");
        assert_eq!(round.events_read, 4);
        assert!(!round.is_aborted());
    }
}
