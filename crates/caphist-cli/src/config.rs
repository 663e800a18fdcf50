//! Job configuration.
//!
//! A job is described by one TOML file:
//!
//! ```toml
//! [history]
//! family = "detection"
//! occasions = 6
//! detect = "seen"
//!
//! [events]
//! path = "captures.csv"
//! subject = "animal"
//! occasion = "occasion"
//! columns = [{ name = "seen", type = "flag" }]
//!
//! [[covariates]]
//! name = "morphometrics"
//! level = "subject"
//! path = "animals.csv"
//! subject = "animal"
//! columns = [{ name = "sex", type = "integer" }]
//!
//! [policy]
//! unjoined = "drop"
//! fill = "carry-forward"
//!
//! [output]
//! dir = "out"
//! format = "both"
//!
//! [formulas]
//! Phi = "~sex"
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use caphist_ingest::{ColumnSpec, TableSchema};
use caphist_model::{
    CovariateLevel, FamilyLayout, FillPolicy, ModelFamily, SubjectErrorPolicy, UnjoinedPolicy,
    Value,
};
use caphist_output::{DEFAULT_MAX_NAME_LENGTH, EmitOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub history: HistorySection,
    pub events: TableSection,
    #[serde(default)]
    pub covariates: Vec<CovariateSection>,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub output: OutputSection,
    /// Parameter name to model formula.
    #[serde(default)]
    pub formulas: BTreeMap<String, String>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySection {
    pub family: ModelFamily,
    pub occasions: u32,
    /// Detection flag (detection, occupancy).
    pub detect: Option<String>,
    /// Death flag (known fate).
    pub dead: Option<String>,
    /// Live-observation flag (known fate); a row counts as observed when unset.
    pub observed: Option<String>,
    /// Activity flag (nest survival).
    pub active: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSection {
    pub path: PathBuf,
    pub subject: String,
    pub occasion: Option<String>,
    pub delimiter: Option<char>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CovariateSection {
    pub name: String,
    pub level: CovariateLevel,
    #[serde(flatten)]
    pub table: TableSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillKind {
    #[default]
    Fail,
    CarryForward,
    Default,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    #[serde(default)]
    pub unjoined: UnjoinedPolicy,
    #[serde(default)]
    pub on_subject_error: SubjectErrorPolicy,
    #[serde(default)]
    pub fill: FillKind,
    /// Value used when `fill = "default"`.
    pub fill_value: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Inp,
    Both,
}

impl OutputFormat {
    pub fn wants_csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }

    pub fn wants_inp(self) -> bool {
        matches!(self, Self::Inp | Self::Both)
    }
}

fn default_max_name_length() -> usize {
    DEFAULT_MAX_NAME_LENGTH
}

fn default_stem() -> String {
    "histories".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub collapse: bool,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// File name stem for the table artifacts.
    #[serde(default = "default_stem")]
    pub stem: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: None,
            collapse: false,
            format: OutputFormat::default(),
            max_name_length: default_max_name_length(),
            stem: default_stem(),
        }
    }
}

impl JobConfig {
    /// Reads, parses, and validates a job file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, base_dir).with_context(|| format!("load config {}", path.display()))
    }

    /// Parses a job from TOML text; relative paths resolve against `base_dir`.
    pub fn parse(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("parse job toml")?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Output directory from the config, or `<config dir>/output`.
    pub fn output_dir(&self) -> PathBuf {
        match &self.output.dir {
            Some(dir) => self.resolve(dir),
            None => self.base_dir.join("output"),
        }
    }

    pub fn layout(&self) -> Result<FamilyLayout> {
        let history = &self.history;
        let require = |value: &Option<String>, key: &str| -> Result<String> {
            match value {
                Some(column) => Ok(column.clone()),
                None => bail!(
                    "family '{}' requires history.{key} to name an event column",
                    history.family
                ),
            }
        };
        Ok(match history.family {
            ModelFamily::Detection => FamilyLayout::Detection {
                detect: require(&history.detect, "detect")?,
            },
            ModelFamily::Occupancy => FamilyLayout::Occupancy {
                detect: require(&history.detect, "detect")?,
            },
            ModelFamily::KnownFate => FamilyLayout::KnownFate {
                dead: require(&history.dead, "dead")?,
                observed: history.observed.clone(),
            },
            ModelFamily::NestSurvival => FamilyLayout::NestSurvival {
                active: require(&history.active, "active")?,
            },
        })
    }

    pub fn events_schema(&self) -> Result<TableSchema> {
        table_schema(&self.events)
    }

    pub fn fill_policy(&self) -> Result<FillPolicy> {
        Ok(match (self.policy.fill, &self.policy.fill_value) {
            (FillKind::Fail, _) => FillPolicy::Fail,
            (FillKind::CarryForward, _) => FillPolicy::CarryForward,
            (FillKind::Default, Some(value)) => FillPolicy::Default(value.clone()),
            (FillKind::Default, None) => bail!("policy.fill = \"default\" requires policy.fill_value"),
        })
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            collapse: self.output.collapse,
            max_name_length: self.output.max_name_length,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.history.occasions == 0 {
            bail!("history.occasions must be at least 1");
        }
        let layout = self.layout()?;
        self.fill_policy()?;

        let events = self.events_schema()?;
        if events.occasion.is_none() {
            bail!("events table must declare an occasion column");
        }
        for column in layout.columns() {
            if events.column(column).is_none() {
                bail!("events.columns must declare '{column}' used by the {} family", self.history.family);
            }
        }

        let mut table_names = BTreeSet::new();
        for covariate in &self.covariates {
            if !table_names.insert(covariate.name.as_str()) {
                bail!("covariate table '{}' is declared twice", covariate.name);
            }
            let schema = table_schema(&covariate.table)
                .with_context(|| format!("covariate table '{}'", covariate.name))?;
            match covariate.level {
                CovariateLevel::Subject => {
                    if schema.occasion.is_some() {
                        bail!(
                            "subject-level covariate table '{}' must not declare an occasion column",
                            covariate.name
                        );
                    }
                    if let Some(column) = schema.columns.iter().find(|column| !column.required) {
                        bail!(
                            "subject-level covariate '{}' in table '{}' must be required",
                            column.name,
                            covariate.name
                        );
                    }
                }
                CovariateLevel::Occasion => {
                    if schema.occasion.is_none() {
                        bail!(
                            "occasion-level covariate table '{}' must declare an occasion column",
                            covariate.name
                        );
                    }
                }
            }
        }

        let parameters = self.history.family.parameters();
        for parameter in self.formulas.keys() {
            if !parameters.contains(&parameter.as_str()) {
                bail!(
                    "family '{}' has no parameter '{parameter}' (expected one of {})",
                    self.history.family,
                    parameters.join(", ")
                );
            }
        }
        Ok(())
    }
}

/// Schema for a declared table section.
pub fn table_schema(section: &TableSection) -> Result<TableSchema> {
    let delimiter = match section.delimiter {
        None => b',',
        Some(c) => u8::try_from(c)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("delimiter '{c}' is not a single-byte character"))?,
    };
    let mut schema = TableSchema::new(section.subject.clone()).with_delimiter(delimiter);
    if let Some(occasion) = &section.occasion {
        schema = schema.with_occasion(occasion.clone());
    }
    for column in &section.columns {
        schema = schema.with_column(column.clone());
    }
    schema.validate_declaration(&section.path)?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [history]
        family = "detection"
        occasions = 4
        detect = "seen"

        [events]
        path = "captures.csv"
        subject = "animal"
        occasion = "occasion"
        columns = [{ name = "seen", type = "flag" }]
    "#;

    #[test]
    fn minimal_job_uses_defaults() {
        let config = JobConfig::parse(MINIMAL, PathBuf::from("/data/job")).unwrap();
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.output.max_name_length, 10);
        assert_eq!(config.policy.unjoined, UnjoinedPolicy::Fail);
        assert_eq!(config.fill_policy().unwrap(), FillPolicy::Fail);
        assert_eq!(
            config.resolve(&config.events.path),
            PathBuf::from("/data/job/captures.csv")
        );
        assert_eq!(config.output_dir(), PathBuf::from("/data/job/output"));
    }

    #[test]
    fn family_column_must_be_declared() {
        let text = MINIMAL.replace("detect = \"seen\"", "detect = \"found\"");
        let err = JobConfig::parse(&text, PathBuf::new()).unwrap_err();
        assert!(err.to_string().contains("found"));
    }

    #[test]
    fn default_fill_needs_a_value() {
        let text = format!("{MINIMAL}\n[policy]\nfill = \"default\"\n");
        assert!(JobConfig::parse(&text, PathBuf::new()).is_err());
        let text = format!("{MINIMAL}\n[policy]\nfill = \"default\"\nfill_value = 0\n");
        let config = JobConfig::parse(&text, PathBuf::new()).unwrap();
        assert_eq!(config.fill_policy().unwrap(), FillPolicy::Default(Value::Integer(0)));
    }

    #[test]
    fn delimiter_must_be_ascii() {
        let with_delimiter = |delimiter: &str| {
            MINIMAL.replace(
                "path = \"captures.csv\"",
                &format!("path = \"captures.csv\"\ndelimiter = \"{delimiter}\""),
            )
        };
        let text = with_delimiter(";");
        let config = JobConfig::parse(&text, PathBuf::new()).unwrap();
        assert_eq!(config.events_schema().unwrap().delimiter, b';');

        let text = with_delimiter("é");
        let err = JobConfig::parse(&text, PathBuf::new()).unwrap_err();
        assert!(format!("{err:#}").contains("single-byte"));
    }

    #[test]
    fn formulas_must_name_family_parameters() {
        let text = format!("{MINIMAL}\n[formulas]\nPsi = \"~1\"\n");
        let err = JobConfig::parse(&text, PathBuf::new()).unwrap_err();
        assert!(format!("{err:#}").contains("Psi"));
    }
}
