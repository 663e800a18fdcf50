//! Nest-survival interval derivation.
//!
//! A nest is found on its first check, stays active for a run of checks, and
//! may then be found inactive (failed). The interval records the first check,
//! the last check at which it was active, and the last check overall.

use caphist_model::{HistoryError, NestInterval, ObservationEvent, Result};

/// Derives the interval from a subject's checks, sorted by occasion.
///
/// # Errors
///
/// `InvalidInterval` when the subject has no checks, was never active, or is
/// active again after an inactive check.
pub fn derive_interval(
    subject: &str,
    checks: &[ObservationEvent],
    active: &str,
    occasions: u32,
) -> Result<NestInterval> {
    let (Some(first), Some(last)) = (checks.first(), checks.last()) else {
        return Err(HistoryError::invalid_interval(subject, "nest has no checks"));
    };
    let mut last_active: Option<u32> = None;
    let mut failed_at: Option<u32> = None;
    for check in checks {
        if check.flag(active) {
            if let Some(failed) = failed_at {
                return Err(HistoryError::invalid_interval(
                    subject,
                    format!(
                        "active at occasion {} after an inactive check at occasion {failed}",
                        check.occasion
                    ),
                ));
            }
            last_active = Some(check.occasion);
        } else if failed_at.is_none() {
            failed_at = Some(check.occasion);
        }
    }
    let Some(last_active) = last_active else {
        return Err(HistoryError::invalid_interval(
            subject,
            "nest was never recorded active",
        ));
    };
    NestInterval::new(subject, first.occasion, last_active, last.occasion, occasions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caphist_model::ErrorKind;

    fn check(occasion: u32, active: i64) -> ObservationEvent {
        ObservationEvent::new("N1", occasion).with_value("active", active)
    }

    #[test]
    fn failed_nest() {
        let checks = [check(2, 1), check(4, 1), check(6, 0)];
        let interval = derive_interval("N1", &checks, "active", 8).unwrap();
        assert_eq!(
            (interval.first(), interval.last_active(), interval.last_checked()),
            (2, 4, 6)
        );
        assert_eq!(interval.fate(), 1);
    }

    #[test]
    fn surviving_nest() {
        let checks = [check(1, 1), check(3, 1)];
        let interval = derive_interval("N1", &checks, "active", 3).unwrap();
        assert_eq!(interval.last_active(), interval.last_checked());
        assert_eq!(interval.fate(), 0);
    }

    #[test]
    fn reactivation_is_invalid() {
        let checks = [check(1, 1), check(2, 0), check(3, 1)];
        let err = derive_interval("N1", &checks, "active", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInterval);
    }

    #[test]
    fn never_active_is_invalid() {
        let err = derive_interval("N1", &[check(1, 0)], "active", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInterval);
        let err = derive_interval("N1", &[], "active", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInterval);
    }
}
