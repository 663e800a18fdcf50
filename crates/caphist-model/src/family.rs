//! Model families and the event columns each one reads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The statistical model family a history set is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    /// Live recaptures (Cormack-Jolly-Seber style): one presence digit per occasion.
    Detection,
    /// Site occupancy surveys: presence digits, `.` for surveys not conducted.
    Occupancy,
    /// Known-fate telemetry: an (observed, died) digit pair per occasion.
    KnownFate,
    /// Nest survival: first-found / last-active / last-checked occasions.
    NestSurvival,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        Self::Detection,
        Self::Occupancy,
        Self::KnownFate,
        Self::NestSurvival,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Occupancy => "occupancy",
            Self::KnownFate => "known-fate",
            Self::NestSurvival => "nest-survival",
        }
    }

    /// Model tag understood by the external engine.
    pub const fn engine_tag(self) -> &'static str {
        match self {
            Self::Detection => "CJS",
            Self::Occupancy => "Occupancy",
            Self::KnownFate => "Known",
            Self::NestSurvival => "Nest",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Detection => "Live-recapture detection histories",
            Self::Occupancy => "Site occupancy survey histories",
            Self::KnownFate => "Known-fate telemetry histories",
            Self::NestSurvival => "Nest survival check intervals",
        }
    }

    /// Real parameters the engine estimates for this family.
    pub const fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Detection => &["Phi", "p"],
            Self::Occupancy => &["Psi", "p"],
            Self::KnownFate | Self::NestSurvival => &["S"],
        }
    }

    /// Characters per occasion token, or `None` for interval records.
    pub const fn token_width(self) -> Option<usize> {
        match self {
            Self::Detection | Self::Occupancy => Some(1),
            Self::KnownFate => Some(2),
            Self::NestSurvival => None,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which event columns drive token assignment for a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyLayout {
    Detection {
        detect: String,
    },
    Occupancy {
        detect: String,
    },
    KnownFate {
        dead: String,
        /// Explicit observed flag; when absent, the presence of a row means observed.
        observed: Option<String>,
    },
    NestSurvival {
        active: String,
    },
}

impl FamilyLayout {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Detection { .. } => ModelFamily::Detection,
            Self::Occupancy { .. } => ModelFamily::Occupancy,
            Self::KnownFate { .. } => ModelFamily::KnownFate,
            Self::NestSurvival { .. } => ModelFamily::NestSurvival,
        }
    }

    /// Event columns this layout reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Detection { detect } | Self::Occupancy { detect } => vec![detect.as_str()],
            Self::KnownFate { dead, observed } => {
                let mut columns = vec![dead.as_str()];
                if let Some(observed) = observed {
                    columns.push(observed.as_str());
                }
                columns
            }
            Self::NestSurvival { active } => vec![active.as_str()],
        }
    }
}
