//! Job pipeline with explicit stages.
//!
//! The pipeline follows these stages in order:
//! 1. **Load**: read the event table and every covariate table
//! 2. **Build**: reshape events into one encounter history per subject
//! 3. **Join**: attach subject- and occasion-level covariates
//! 4. **Gate**: abort when any subject issue is marked failed
//! 5. **Emit**: render CSV / `.inp` / manifest in memory, then write
//!
//! Structural problems (unreadable files, schema mismatches, over-long column
//! names) return an error immediately. Subject problems are collected in the
//! [`RunReport`] and settled at the gate. Nothing is written unless every
//! stage and the gate have passed.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn};

use caphist_ingest::{load_events, load_subject_records};
use caphist_model::{
    CovariateLevel, Disposition, HistoryError, JoinedRecord, ObservationEvent, PipelineStage,
    RunReport, SubjectErrorPolicy,
};
use caphist_output::{build_formatted_table, build_manifest, render_csv, render_inp};
use caphist_transform::{CovariateSource, JoinOptions, build_histories, join_covariates};

use crate::config::{JobConfig, OutputFormat, table_schema};
use crate::types::{Artifact, ArtifactSummary, RunMode, RunResult};

/// File holding the run report next to the emitted artifacts.
pub const REPORT_FILE: &str = "report.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// A job plus the command-line overrides that apply to it.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: JobConfig,
    pub mode: RunMode,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub collapse: bool,
}

impl RunRequest {
    /// A request using the config's own output settings.
    pub fn from_config(config: JobConfig, mode: RunMode) -> Self {
        Self {
            output_dir: config.output_dir(),
            format: config.output.format,
            collapse: config.output.collapse,
            config,
            mode,
        }
    }
}

/// Runs every stage of a job.
pub fn run_job(request: &RunRequest) -> Result<RunResult> {
    let config = &request.config;
    let family = config.history.family;
    let occasions = config.history.occasions;
    let span = info_span!("job", family = %family, occasions);
    let _guard = span.enter();
    let start = Instant::now();

    let mut report = RunReport::default();
    let inputs = load(config)?;
    report.events_read = inputs.events.len();

    let records = build_and_join(config, inputs, &mut report)?;

    let mut result = RunResult {
        family,
        occasions,
        mode: request.mode,
        output_dir: request.output_dir.clone(),
        report,
        artifacts: Vec::new(),
        aborted: false,
        written: false,
    };
    if result.report.is_aborted() {
        error!(
            failed_count = result.report.failed_count(),
            "run aborted by subject errors; nothing written"
        );
        result.aborted = true;
        return Ok(result);
    }
    if request.mode == RunMode::Check {
        info!(duration_ms = start.elapsed().as_millis(), "check complete");
        return Ok(result);
    }

    let (artifacts, emitted) = emit(request, records)?;
    result.report.records_emitted = emitted;
    result.artifacts = artifacts
        .iter()
        .map(|artifact| ArtifactSummary {
            file_name: artifact.file_name.clone(),
            path: request.output_dir.join(&artifact.file_name),
            bytes: artifact.bytes.len(),
            sha256: artifact.sha256.clone(),
        })
        .collect();

    if request.mode == RunMode::Write {
        result.written = true;
        let report = serde_json::to_vec_pretty(&result).context("serialize run report")?;
        let mut files: Vec<(&str, &[u8])> = artifacts
            .iter()
            .map(|artifact| (artifact.file_name.as_str(), artifact.bytes.as_slice()))
            .collect();
        files.push((REPORT_FILE, report.as_slice()));
        write_outputs(&request.output_dir, &files)?;
    }
    info!(
        artifact_count = result.artifacts.len(),
        written = result.written,
        duration_ms = start.elapsed().as_millis(),
        "run complete"
    );
    Ok(result)
}

// ============================================================================
// Stage 1: Load
// ============================================================================

/// Loaded inputs, ready to build.
#[derive(Debug)]
pub struct LoadedInputs {
    pub events: Vec<ObservationEvent>,
    pub source: CovariateSource,
}

pub fn load(config: &JobConfig) -> Result<LoadedInputs> {
    let span = info_span!("load");
    let _guard = span.enter();

    let events_path = config.resolve(&config.events.path);
    let events = load_events(&events_path, &config.events_schema()?)
        .with_context(|| format!("load events table {}", events_path.display()))?;

    let mut source = CovariateSource::new();
    for covariate in &config.covariates {
        let path = config.resolve(&covariate.table.path);
        let schema = table_schema(&covariate.table)?;
        let columns = schema.value_names();
        match covariate.level {
            CovariateLevel::Subject => {
                let records = load_subject_records(&path, &schema)
                    .with_context(|| format!("load covariate table {}", path.display()))?;
                source.add_subject_records(&covariate.name, &columns, records)?;
            }
            CovariateLevel::Occasion => {
                let rows = load_events(&path, &schema)
                    .with_context(|| format!("load covariate table {}", path.display()))?;
                source.add_occasion_events(&covariate.name, &columns, rows)?;
            }
        }
        debug!(table = %covariate.name, level = ?covariate.level, "covariate table loaded");
    }
    Ok(LoadedInputs { events, source })
}

// ============================================================================
// Stages 2-3: Build and Join
// ============================================================================

/// Builds histories and joins covariates, recording every subject issue.
pub fn build_and_join(
    config: &JobConfig,
    inputs: LoadedInputs,
    report: &mut RunReport,
) -> Result<Vec<JoinedRecord>> {
    let layout = config.layout()?;
    let occasions = config.history.occasions;
    let policy = config.policy.on_subject_error;

    let roster: BTreeSet<String> = inputs.source.roster();
    let built = build_histories(inputs.events, &roster, &layout, occasions);
    report.histories_built = built.histories.len();
    report.subjects_seen = built.histories.len() + built.issues.len();
    for issue in &built.issues {
        report.push(PipelineStage::Build, issue, subject_disposition(issue, policy));
    }

    let options = JoinOptions {
        unjoined: config.policy.unjoined,
        fill: config.fill_policy()?,
    };
    let joined = join_covariates(built.histories, &inputs.source, &options);
    report.records_joined = joined.records.len();
    for issue in &joined.issues {
        report.push(PipelineStage::Join, issue, subject_disposition(issue, policy));
    }
    for dropped in &joined.dropped {
        report.push(PipelineStage::Join, dropped, Disposition::Excluded);
    }
    Ok(joined.records)
}

/// Settles a subject issue against the subject error policy.
///
/// Unjoined subjects only reach the report as issues under the failing
/// unjoined policy, so they always fail.
pub fn subject_disposition(error: &HistoryError, policy: SubjectErrorPolicy) -> Disposition {
    match (error, policy) {
        (HistoryError::UnjoinedSubject { .. }, _) | (_, SubjectErrorPolicy::Abort) => {
            Disposition::Failed
        }
        (_, SubjectErrorPolicy::Exclude) => Disposition::Excluded,
    }
}

// ============================================================================
// Stage 4: Emit
// ============================================================================

/// Renders every requested artifact in memory.
///
/// Returns the artifacts and the number of emitted records.
pub fn emit(request: &RunRequest, records: Vec<JoinedRecord>) -> Result<(Vec<Artifact>, usize)> {
    let span = info_span!("emit");
    let _guard = span.enter();
    let config = &request.config;

    let mut options = config.emit_options();
    options.collapse = request.collapse;
    let table = build_formatted_table(
        records,
        config.history.family,
        config.history.occasions,
        &options,
    )?;
    let manifest = build_manifest(&table, &config.formulas)?;

    let stem = &config.output.stem;
    let mut artifacts = Vec::new();
    if request.format.wants_csv() {
        artifacts.push(artifact(format!("{stem}.csv"), render_csv(&table)?));
    }
    if request.format.wants_inp() {
        artifacts.push(artifact(format!("{stem}.inp"), render_inp(&table)?.into_bytes()));
    }
    let manifest_bytes = serde_json::to_vec_pretty(&manifest).context("serialize manifest")?;
    artifacts.push(artifact(MANIFEST_FILE.to_string(), manifest_bytes));
    for artifact in &artifacts {
        debug!(file = %artifact.file_name, sha256 = %artifact.sha256, "artifact rendered");
    }
    Ok((artifacts, table.len()))
}

fn artifact(file_name: String, bytes: Vec<u8>) -> Artifact {
    let sha256 = sha256_hex(&bytes);
    Artifact {
        file_name,
        bytes,
        sha256,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ============================================================================
// Stage 5: Write
// ============================================================================

/// Writes every file into `output_dir`, or none of them.
///
/// Files are written and synced inside a staging directory first, then
/// renamed into place. Files replaced by a rename are kept aside until every
/// rename has succeeded and are restored if one fails.
pub fn write_outputs(output_dir: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    let created = !output_dir.exists();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create {}", output_dir.display()))?;
    let outcome = stage_and_publish(output_dir, files);
    if outcome.is_err() && created {
        // Only succeeds when the directory is still empty.
        let _ = fs::remove_dir(output_dir);
    }
    outcome
}

fn stage_and_publish(output_dir: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (name, _) in files {
        let target = output_dir.join(name);
        if target.exists() && !target.is_file() {
            bail!("{} exists and is not a file", target.display());
        }
    }

    let staging = tempfile::Builder::new()
        .prefix(".caphist-staging-")
        .tempdir_in(output_dir)
        .with_context(|| format!("create staging directory in {}", output_dir.display()))?;
    let fresh = staging.path().join("new");
    let previous = staging.path().join("previous");
    fs::create_dir(&fresh).with_context(|| format!("create {}", fresh.display()))?;
    fs::create_dir(&previous).with_context(|| format!("create {}", previous.display()))?;

    for (name, bytes) in files {
        let path = fresh.join(name);
        write_synced(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    }

    let mut published: Vec<(&str, bool)> = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let target = output_dir.join(name);
        let kept = previous.join(name);
        let replaced = target.is_file();
        if let Err(error) = replace_file(&fresh.join(name), &target, &kept, replaced) {
            if replaced && kept.exists() {
                let _ = fs::rename(&kept, &target);
            }
            roll_back(output_dir, &previous, &published);
            return Err(error).with_context(|| format!("publish {}", target.display()));
        }
        published.push((*name, replaced));
        info!(path = %target.display(), bytes = bytes.len(), "artifact written");
    }
    Ok(())
}

/// Moves `target` aside to `kept` when it exists, then renames `fresh` over it.
fn replace_file(fresh: &Path, target: &Path, kept: &Path, replaced: bool) -> io::Result<()> {
    if replaced {
        fs::rename(target, kept)?;
    }
    fs::rename(fresh, target)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Best effort: puts the replaced files back and removes new ones.
fn roll_back(output_dir: &Path, previous: &Path, published: &[(&str, bool)]) {
    for (name, replaced) in published.iter().rev() {
        let target = output_dir.join(name);
        let restored = if *replaced {
            fs::rename(previous.join(name), &target)
        } else {
            fs::remove_file(&target)
        };
        if let Err(error) = restored {
            warn!(path = %target.display(), %error, "rollback incomplete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn roll_back_restores_replaced_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let previous = dir.path().join("previous");
        fs::create_dir(&previous).unwrap();
        fs::write(previous.join("a.csv"), "old").unwrap();
        fs::write(dir.path().join("a.csv"), "new").unwrap();
        fs::write(dir.path().join("b.csv"), "new").unwrap();

        roll_back(dir.path(), &previous, &[("a.csv", true), ("b.csv", false)]);

        assert_eq!(fs::read_to_string(dir.path().join("a.csv")).unwrap(), "old");
        assert!(!dir.path().join("b.csv").exists());
    }

    #[test]
    fn unjoined_subjects_always_fail() {
        let unjoined = HistoryError::UnjoinedSubject {
            subject: "A".to_string(),
            table: "morph".to_string(),
        };
        let duplicate = HistoryError::DuplicateOccasion {
            subject: "A".to_string(),
            occasion: 2,
        };
        assert_eq!(
            subject_disposition(&unjoined, SubjectErrorPolicy::Exclude),
            Disposition::Failed
        );
        assert_eq!(
            subject_disposition(&duplicate, SubjectErrorPolicy::Exclude),
            Disposition::Excluded
        );
        assert_eq!(
            subject_disposition(&duplicate, SubjectErrorPolicy::Abort),
            Disposition::Failed
        );
    }
}
