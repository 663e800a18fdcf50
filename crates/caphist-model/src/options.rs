//! Policies controlling how per-subject problems are handled.

use serde::{Deserialize, Serialize};

use crate::event::Value;

/// What to do with a history whose subject has no covariate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnjoinedPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Exclude the subject and report it in the summary.
    Drop,
}

/// How to fill an occasion with no supplied covariate value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FillPolicy {
    #[default]
    Fail,
    /// Repeat the last earlier value.
    CarryForward,
    /// Use a fixed value.
    Default(Value),
}

/// What to do when a subject fails to build or join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectErrorPolicy {
    /// Abort the run when any subject fails.
    #[default]
    Abort,
    /// Exclude failing subjects and continue.
    Exclude,
}
