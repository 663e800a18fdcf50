//! Long-to-wide reshaping of observation events into encounter histories.
//!
//! Events are grouped by subject, sorted by occasion, and turned into exactly
//! `occasions` tokens according to the family layout:
//!
//! - **Detection**: `1` when a positive detection was recorded, `0` otherwise.
//!   A missing row is a non-detection, never an error.
//! - **Occupancy**: as detection, but an empty detection cell marks a survey
//!   that was not conducted (`.`).
//! - **Known fate**: an (observed, died) pair per occasion. Occasions without a
//!   row are unobserved (`00`); nothing may be observed after a death.
//! - **Nest survival**: an interval record, see [`crate::interval`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use caphist_model::{
    EncounterHistory, FamilyLayout, HistoryError, ObservationEvent, Result, Token,
};

use crate::interval::derive_interval;

/// Histories built for every subject that passed, plus the per-subject errors
/// of those that did not.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub histories: Vec<EncounterHistory>,
    pub issues: Vec<HistoryError>,
}

/// Builds one history per subject.
///
/// `roster` lists subjects known from elsewhere (for example a subject-level
/// covariate table); roster subjects without events still get a history.
/// Subjects are processed in ascending identifier order, so the outcome is a
/// pure function of the inputs.
pub fn build_histories(
    events: Vec<ObservationEvent>,
    roster: &BTreeSet<String>,
    layout: &FamilyLayout,
    occasions: u32,
) -> BuildOutcome {
    let family = layout.family();
    let span = info_span!("build_histories", family = %family, occasions);
    let _guard = span.enter();
    let start = Instant::now();

    let mut grouped = group_by_subject(events);
    for subject in roster {
        grouped.entry(subject.clone()).or_default();
    }

    let mut outcome = BuildOutcome::default();
    for (subject, subject_events) in grouped {
        match build_subject_history(&subject, subject_events, layout, occasions) {
            Ok(history) => outcome.histories.push(history),
            Err(error) => {
                warn!(subject = %subject, kind = %error.kind(), "history rejected: {error}");
                outcome.issues.push(error);
            }
        }
    }
    info!(
        history_count = outcome.histories.len(),
        rejected_count = outcome.issues.len(),
        duration_ms = start.elapsed().as_millis(),
        "histories built"
    );
    outcome
}

/// Groups events by subject identifier (exact equality).
pub fn group_by_subject(events: Vec<ObservationEvent>) -> BTreeMap<String, Vec<ObservationEvent>> {
    let mut grouped: BTreeMap<String, Vec<ObservationEvent>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.subject.clone()).or_default().push(event);
    }
    grouped
}

/// Builds the history of a single subject from its events.
///
/// # Errors
///
/// `OccasionOutOfRange`, `DuplicateOccasion`, `PostMortemObservation`, or
/// (nest survival) `InvalidInterval`.
pub fn build_subject_history(
    subject: &str,
    mut events: Vec<ObservationEvent>,
    layout: &FamilyLayout,
    occasions: u32,
) -> Result<EncounterHistory> {
    if let Some(event) = events
        .iter()
        .find(|event| event.occasion == 0 || event.occasion > occasions)
    {
        return Err(HistoryError::OccasionOutOfRange {
            subject: subject.to_string(),
            occasion: event.occasion,
            occasions,
        });
    }
    events.sort_by_key(|event| event.occasion);
    if let Some(pair) = events
        .windows(2)
        .find(|pair| pair[0].occasion == pair[1].occasion)
    {
        return Err(HistoryError::DuplicateOccasion {
            subject: subject.to_string(),
            occasion: pair[0].occasion,
        });
    }

    let slots = occasions as usize;
    let history = match layout {
        FamilyLayout::Detection { detect } => {
            let mut tokens = vec![Token::NotDetected; slots];
            for event in &events {
                if event.flag(detect) {
                    tokens[slot(event)] = Token::Detected;
                }
            }
            EncounterHistory::from_tokens(subject, tokens)
        }
        FamilyLayout::Occupancy { detect } => {
            let mut tokens = vec![Token::NotDetected; slots];
            for event in &events {
                tokens[slot(event)] = match event.value(detect) {
                    None => Token::NotSampled,
                    Some(value) if value.is_positive() => Token::Detected,
                    Some(_) => Token::NotDetected,
                };
            }
            EncounterHistory::from_tokens(subject, tokens)
        }
        FamilyLayout::KnownFate { dead, observed } => {
            let tokens = known_fate_tokens(subject, &events, dead, observed.as_deref(), slots)?;
            EncounterHistory::from_tokens(subject, tokens)
        }
        FamilyLayout::NestSurvival { active } => {
            let interval = derive_interval(subject, &events, active, occasions)?;
            EncounterHistory::from_interval(subject, interval, occasions)
        }
    };
    debug!(
        subject,
        event_count = events.len(),
        history = history.history_string().as_deref().unwrap_or("-"),
        "history built"
    );
    Ok(history)
}

fn slot(event: &ObservationEvent) -> usize {
    event.occasion as usize - 1
}

/// Events must already be sorted by occasion.
fn known_fate_tokens(
    subject: &str,
    events: &[ObservationEvent],
    dead: &str,
    observed: Option<&str>,
    slots: usize,
) -> Result<Vec<Token>> {
    let mut tokens = vec![Token::UNOBSERVED; slots];
    let mut death: Option<u32> = None;
    for event in events {
        let died = event.flag(dead);
        let seen = observed.is_none_or(|column| event.flag(column));
        if let Some(death) = death {
            if seen || died {
                return Err(HistoryError::PostMortemObservation {
                    subject: subject.to_string(),
                    death,
                    occasion: event.occasion,
                });
            }
            continue;
        }
        tokens[slot(event)] = Token::Fate {
            observed: seen,
            died,
        };
        if died {
            death = Some(event.occasion);
        }
    }
    Ok(tokens)
}
