//! Reshaping of loaded observation rows into model-ready records.
//!
//! [`build_histories`] turns long-format events into one encounter history per
//! subject; [`join_covariates`] attaches subject- and occasion-level
//! covariates to those histories.

pub mod history;
pub mod interval;
pub mod join;

pub use history::{BuildOutcome, build_histories, build_subject_history, group_by_subject};
pub use interval::derive_interval;
pub use join::{CovariateSource, JoinOptions, JoinOutcome, join_covariates};
