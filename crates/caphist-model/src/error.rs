//! Error taxonomy shared by every pipeline stage.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a [`HistoryError`], used for summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SchemaMismatch,
    MalformedRecord,
    DuplicateOccasion,
    OccasionOutOfRange,
    DuplicateSubject,
    PostMortemObservation,
    InvalidInterval,
    UnjoinedSubject,
    NameCollision,
    MissingOccasionCovariate,
    ColumnNameTooLong,
    NonNumericCovariate,
    UnknownFormulaTerm,
    Io,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaMismatch => "SchemaMismatch",
            Self::MalformedRecord => "MalformedRecord",
            Self::DuplicateOccasion => "DuplicateOccasion",
            Self::OccasionOutOfRange => "OccasionOutOfRange",
            Self::DuplicateSubject => "DuplicateSubject",
            Self::PostMortemObservation => "PostMortemObservation",
            Self::InvalidInterval => "InvalidInterval",
            Self::UnjoinedSubject => "UnjoinedSubject",
            Self::NameCollision => "NameCollision",
            Self::MissingOccasionCovariate => "MissingOccasionCovariate",
            Self::ColumnNameTooLong => "ColumnNameTooLong",
            Self::NonNumericCovariate => "NonNumericCovariate",
            Self::UnknownFormulaTerm => "UnknownFormulaTerm",
            Self::Io => "Io",
        }
    }

    /// Structural errors invalidate the whole run configuration and are never
    /// isolated to a single subject.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch
                | Self::MalformedRecord
                | Self::ColumnNameTooLong
                | Self::NonNumericCovariate
                | Self::UnknownFormulaTerm
                | Self::Io
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while loading, reshaping, joining, or emitting records.
#[derive(Debug, Error)]
pub enum HistoryError {
    // === Loader ===
    /// A declared column is absent, or the declaration itself is inconsistent.
    #[error("schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },

    /// A field could not be parsed to its declared type.
    #[error("malformed record at {path}:{line}: column '{column}' value '{value}' is not {expected}")]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
        expected: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === History builder ===
    #[error("subject '{subject}' has more than one record for occasion {occasion}")]
    DuplicateOccasion { subject: String, occasion: u32 },

    #[error("subject '{subject}' has occasion {occasion} outside 1..={occasions}")]
    OccasionOutOfRange {
        subject: String,
        occasion: u32,
        occasions: u32,
    },

    #[error("subject '{subject}' observed at occasion {occasion} after death at occasion {death}")]
    PostMortemObservation {
        subject: String,
        death: u32,
        occasion: u32,
    },

    #[error("invalid interval for subject '{subject}': {reason}")]
    InvalidInterval { subject: String, reason: String },

    // === Covariate joiner ===
    #[error("subject '{subject}' has no row in covariate table '{table}'")]
    UnjoinedSubject { subject: String, table: String },

    #[error("subject '{subject}' appears more than once in covariate table '{table}'")]
    DuplicateSubject { subject: String, table: String },

    #[error("covariate name '{name}' collides{}: {reason}", subject_suffix(.subject.as_deref()))]
    NameCollision {
        subject: Option<String>,
        name: String,
        reason: String,
    },

    #[error("subject '{subject}' has no value for covariate '{name}' at occasion {occasion}")]
    MissingOccasionCovariate {
        subject: String,
        name: String,
        occasion: u32,
    },

    // === Emitter ===
    #[error("column name '{column}' is {length} characters; the engine accepts at most {limit}")]
    ColumnNameTooLong {
        column: String,
        length: usize,
        limit: usize,
    },

    #[error("covariate column '{column}' holds non-numeric value '{value}'")]
    NonNumericCovariate { column: String, value: String },

    #[error("formula for parameter '{parameter}' references unknown term '{term}'")]
    UnknownFormulaTerm { parameter: String, term: String },
}

fn subject_suffix(subject: Option<&str>) -> String {
    subject
        .map(|subject| format!(" for subject '{subject}'"))
        .unwrap_or_default()
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::Io { .. } => ErrorKind::Io,
            Self::DuplicateOccasion { .. } => ErrorKind::DuplicateOccasion,
            Self::OccasionOutOfRange { .. } => ErrorKind::OccasionOutOfRange,
            Self::PostMortemObservation { .. } => ErrorKind::PostMortemObservation,
            Self::InvalidInterval { .. } => ErrorKind::InvalidInterval,
            Self::UnjoinedSubject { .. } => ErrorKind::UnjoinedSubject,
            Self::DuplicateSubject { .. } => ErrorKind::DuplicateSubject,
            Self::NameCollision { .. } => ErrorKind::NameCollision,
            Self::MissingOccasionCovariate { .. } => ErrorKind::MissingOccasionCovariate,
            Self::ColumnNameTooLong { .. } => ErrorKind::ColumnNameTooLong,
            Self::NonNumericCovariate { .. } => ErrorKind::NonNumericCovariate,
            Self::UnknownFormulaTerm { .. } => ErrorKind::UnknownFormulaTerm,
        }
    }

    /// The subject this error is isolated to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::DuplicateOccasion { subject, .. }
            | Self::OccasionOutOfRange { subject, .. }
            | Self::PostMortemObservation { subject, .. }
            | Self::InvalidInterval { subject, .. }
            | Self::UnjoinedSubject { subject, .. }
            | Self::DuplicateSubject { subject, .. }
            | Self::MissingOccasionCovariate { subject, .. } => Some(subject),
            Self::NameCollision { subject, .. } => subject.as_deref(),
            _ => None,
        }
    }

    pub fn invalid_interval(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInterval {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn schema_mismatch(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::DuplicateOccasion {
            subject: "A".to_string(),
            occasion: 3,
        };
        assert_eq!(
            err.to_string(),
            "subject 'A' has more than one record for occasion 3"
        );
    }

    #[test]
    fn test_name_collision_display() {
        let err = HistoryError::NameCollision {
            subject: None,
            name: "freq".to_string(),
            reason: "reserved output column".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "covariate name 'freq' collides: reserved output column"
        );
        let err = HistoryError::NameCollision {
            subject: Some("B7".to_string()),
            name: "mass".to_string(),
            reason: "supplied at both subject and occasion level".to_string(),
        };
        assert!(err.to_string().contains("for subject 'B7'"));
        assert_eq!(err.subject(), Some("B7"));
    }

    #[test]
    fn test_structural_kinds() {
        assert!(ErrorKind::SchemaMismatch.is_structural());
        assert!(ErrorKind::ColumnNameTooLong.is_structural());
        assert!(!ErrorKind::UnjoinedSubject.is_structural());
        assert!(!ErrorKind::PostMortemObservation.is_structural());
    }
}
