use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, HistoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Load,
    Build,
    Join,
    Emit,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Build => "build",
            Self::Join => "join",
            Self::Emit => "emit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Subject left out; the run continues.
    Excluded,
    /// Subject failure aborts the run.
    Failed,
}

/// A problem isolated to one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectIssue {
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    /// Empty when the error is not tied to a subject.
    pub subject: String,
    pub disposition: Disposition,
    pub message: String,
}

impl SubjectIssue {
    pub fn from_error(stage: PipelineStage, error: &HistoryError, disposition: Disposition) -> Self {
        Self {
            stage,
            kind: error.kind(),
            subject: error.subject().unwrap_or_default().to_string(),
            disposition,
            message: error.to_string(),
        }
    }
}

/// Per-run accounting of subjects in, records out, and every issue raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub events_read: usize,
    pub subjects_seen: usize,
    pub histories_built: usize,
    pub records_joined: usize,
    pub records_emitted: usize,
    pub issues: Vec<SubjectIssue>,
}

impl RunReport {
    pub fn push(&mut self, stage: PipelineStage, error: &HistoryError, disposition: Disposition) {
        self.issues
            .push(SubjectIssue::from_error(stage, error, disposition));
    }

    pub fn counts_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn excluded_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.disposition == Disposition::Excluded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.disposition == Disposition::Failed)
            .count()
    }

    pub fn affected_subjects(&self) -> BTreeSet<&str> {
        self.issues
            .iter()
            .map(|issue| issue.subject.as_str())
            .filter(|subject| !subject.is_empty())
            .collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.failed_count() > 0
    }
}
