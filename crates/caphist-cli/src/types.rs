use std::path::PathBuf;

use serde::Serialize;

use caphist_model::{ModelFamily, RunReport};

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Load, build and join only.
    Check,
    /// Everything except writing files.
    DryRun,
    Write,
}

/// An emitted file, rendered in memory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub file_name: String,
    pub path: PathBuf,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub family: ModelFamily,
    pub occasions: u32,
    pub mode: RunMode,
    pub output_dir: PathBuf,
    pub report: RunReport,
    pub artifacts: Vec<ArtifactSummary>,
    /// True when the gate stopped the run before emission.
    pub aborted: bool,
    pub written: bool,
}
