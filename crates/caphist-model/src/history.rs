//! Encounter histories: one fixed-length record per subject.

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};

/// A single occasion's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    Detected,
    NotDetected,
    /// Survey not conducted (occupancy).
    NotSampled,
    Fate { observed: bool, died: bool },
}

impl Token {
    /// Known-fate token for an occasion the subject was not under observation.
    pub const UNOBSERVED: Token = Token::Fate {
        observed: false,
        died: false,
    };

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "1",
            Self::NotDetected => "0",
            Self::NotSampled => ".",
            Self::Fate {
                observed: false,
                died: false,
            } => "00",
            Self::Fate {
                observed: true,
                died: false,
            } => "10",
            Self::Fate {
                observed: true,
                died: true,
            } => "11",
            Self::Fate {
                observed: false,
                died: true,
            } => "01",
        }
    }

    pub const fn is_observed(self) -> bool {
        match self {
            Self::Detected => true,
            Self::NotDetected | Self::NotSampled => false,
            Self::Fate { observed, .. } => observed,
        }
    }

    pub const fn is_death(self) -> bool {
        matches!(self, Self::Fate { died: true, .. })
    }
}

/// Nest-survival interval record.
///
/// Always satisfies `1 <= first <= last_active <= last_checked <= occasions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NestInterval {
    first: u32,
    last_active: u32,
    last_checked: u32,
}

impl NestInterval {
    pub fn new(
        subject: &str,
        first: u32,
        last_active: u32,
        last_checked: u32,
        occasions: u32,
    ) -> Result<Self> {
        if first == 0 {
            return Err(HistoryError::invalid_interval(
                subject,
                "first occasion must be at least 1",
            ));
        }
        if !(first <= last_active && last_active <= last_checked && last_checked <= occasions) {
            return Err(HistoryError::invalid_interval(
                subject,
                format!(
                    "expected first <= last active <= last checked <= {occasions}, \
                     got {first}, {last_active}, {last_checked}"
                ),
            ));
        }
        Ok(Self {
            first,
            last_active,
            last_checked,
        })
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn last_active(&self) -> u32 {
        self.last_active
    }

    pub fn last_checked(&self) -> u32 {
        self.last_checked
    }

    /// 0 when the nest was still active at the last check, 1 otherwise.
    pub fn fate(&self) -> u8 {
        u8::from(self.last_active != self.last_checked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryBody {
    Tokens(Vec<Token>),
    Interval(NestInterval),
}

impl HistoryBody {
    /// Concatenated token string; `None` for interval records.
    pub fn history_string(&self) -> Option<String> {
        match self {
            Self::Tokens(tokens) => Some(tokens.iter().map(|token| token.as_str()).collect()),
            Self::Interval(_) => None,
        }
    }

    /// Grouping key that distinguishes every distinct body.
    pub fn key(&self) -> String {
        match self {
            Self::Tokens(_) => self.history_string().unwrap_or_default(),
            Self::Interval(interval) => format!(
                "{}:{}:{}",
                interval.first(),
                interval.last_active(),
                interval.last_checked()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterHistory {
    pub subject: String,
    pub occasions: u32,
    pub body: HistoryBody,
}

impl EncounterHistory {
    pub fn from_tokens(subject: impl Into<String>, tokens: Vec<Token>) -> Self {
        let occasions = u32::try_from(tokens.len()).unwrap_or(u32::MAX);
        Self {
            subject: subject.into(),
            occasions,
            body: HistoryBody::Tokens(tokens),
        }
    }

    pub fn from_interval(subject: impl Into<String>, interval: NestInterval, occasions: u32) -> Self {
        Self {
            subject: subject.into(),
            occasions,
            body: HistoryBody::Interval(interval),
        }
    }

    pub fn tokens(&self) -> Option<&[Token]> {
        match &self.body {
            HistoryBody::Tokens(tokens) => Some(tokens),
            HistoryBody::Interval(_) => None,
        }
    }

    pub fn interval(&self) -> Option<&NestInterval> {
        match &self.body {
            HistoryBody::Interval(interval) => Some(interval),
            HistoryBody::Tokens(_) => None,
        }
    }

    pub fn history_string(&self) -> Option<String> {
        self.body.history_string()
    }

    /// 1-based occasion of the first death token, if any.
    pub fn death_occasion(&self) -> Option<u32> {
        let tokens = self.tokens()?;
        tokens
            .iter()
            .position(|token| token.is_death())
            .and_then(|index| u32::try_from(index + 1).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fate_tokens_render_as_pairs() {
        let history = EncounterHistory::from_tokens(
            "K1",
            vec![
                Token::Fate {
                    observed: true,
                    died: false,
                },
                Token::UNOBSERVED,
                Token::Fate {
                    observed: true,
                    died: true,
                },
            ],
        );
        assert_eq!(history.history_string().as_deref(), Some("100011"));
        assert_eq!(history.death_occasion(), Some(3));
    }

    #[test]
    fn nest_fate_follows_last_active() {
        let survived = NestInterval::new("N1", 1, 4, 4, 5).unwrap();
        assert_eq!(survived.fate(), 0);
        let failed = NestInterval::new("N2", 2, 3, 5, 5).unwrap();
        assert_eq!(failed.fate(), 1);
    }
}
