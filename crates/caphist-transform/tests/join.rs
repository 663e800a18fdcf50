use caphist_model::{
    CovariateValues, EncounterHistory, ErrorKind, FillPolicy, HistoryError, ObservationEvent,
    SubjectRecord, Token, UnjoinedPolicy, Value,
};
use caphist_transform::{CovariateSource, JoinOptions, join_covariates};

fn history(subject: &str, occasions: usize) -> EncounterHistory {
    EncounterHistory::from_tokens(subject, vec![Token::NotDetected; occasions])
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn sex_table() -> Vec<SubjectRecord> {
    vec![
        SubjectRecord::new("A").with_value("sex", "F"),
        SubjectRecord::new("B").with_value("sex", "M"),
    ]
}

fn temperature(subject: &str, occasion: u32, value: i64) -> ObservationEvent {
    ObservationEvent::new(subject, occasion).with_value("temp", value)
}

#[test]
fn subject_covariates_attach_by_identifier() {
    let source = CovariateSource::from_subject_records("morph", &names(&["sex"]), sex_table())
        .expect("source");
    let outcome = join_covariates(
        vec![history("B", 2), history("A", 2)],
        &source,
        &JoinOptions::default(),
    );
    assert!(outcome.issues.is_empty());
    assert_eq!(outcome.records[0].history.subject, "B");
    assert_eq!(
        outcome.records[0].covariates.get("sex"),
        Some(&CovariateValues::Subject(Value::from("M")))
    );
}

#[test]
fn unjoined_subject_fails_by_default_and_drops_on_request() {
    let source = CovariateSource::from_subject_records("morph", &names(&["sex"]), sex_table())
        .expect("source");
    let histories = vec![history("A", 1), history("C", 1)];

    let failed = join_covariates(histories.clone(), &source, &JoinOptions::default());
    assert_eq!(failed.records.len(), 1);
    assert!(matches!(
        failed.issues.as_slice(),
        [HistoryError::UnjoinedSubject { subject, .. }] if subject == "C"
    ));

    let options = JoinOptions {
        unjoined: UnjoinedPolicy::Drop,
        ..JoinOptions::default()
    };
    let dropped = join_covariates(histories, &source, &options);
    assert!(dropped.issues.is_empty());
    assert_eq!(dropped.dropped.len(), 1);
    assert_eq!(dropped.records.len(), 1);
}

#[test]
fn missing_occasion_value_fails_under_default_policy() {
    let mut source = CovariateSource::new();
    source
        .add_occasion_events(
            "weather",
            &names(&["temp"]),
            vec![temperature("A", 1, 10), temperature("A", 3, 12)],
        )
        .unwrap();
    let outcome = join_covariates(vec![history("A", 3)], &source, &JoinOptions::default());
    match outcome.issues.as_slice() {
        [HistoryError::MissingOccasionCovariate { name, occasion, .. }] => {
            assert_eq!(name, "temp");
            assert_eq!(*occasion, 2);
        }
        other => panic!("unexpected issues: {other:?}"),
    }
}

#[test]
fn default_fill_policy_supplies_a_fixed_value() {
    let mut source = CovariateSource::new();
    source
        .add_occasion_events("weather", &names(&["temp"]), vec![temperature("A", 2, 7)])
        .unwrap();
    let options = JoinOptions {
        fill: FillPolicy::Default(Value::Integer(0)),
        ..JoinOptions::default()
    };
    let outcome = join_covariates(vec![history("A", 3)], &source, &options);
    assert_eq!(
        outcome.records[0].covariates.get("temp"),
        Some(&CovariateValues::Occasion(vec![
            Value::Integer(0),
            Value::Integer(7),
            Value::Integer(0)
        ]))
    );
}

#[test]
fn row_order_does_not_change_the_join() {
    let rows = vec![
        temperature("A", 1, 10),
        temperature("B", 1, 4),
        temperature("A", 2, 11),
        temperature("B", 2, 5),
    ];
    let mut reversed = rows.clone();
    reversed.reverse();

    let join = |events: Vec<ObservationEvent>| {
        let mut source = CovariateSource::new();
        source
            .add_occasion_events("weather", &names(&["temp"]), events)
            .unwrap();
        join_covariates(
            vec![history("A", 2), history("B", 2)],
            &source,
            &JoinOptions::default(),
        )
        .records
    };
    assert_eq!(join(rows), join(reversed));
}

#[test]
fn duplicate_rows_are_reported_per_subject() {
    let mut records = sex_table();
    records.push(SubjectRecord::new("A").with_value("sex", "M"));
    let mut source =
        CovariateSource::from_subject_records("morph", &names(&["sex"]), records).unwrap();
    source
        .add_occasion_events(
            "weather",
            &names(&["temp"]),
            vec![
                temperature("B", 1, 1),
                temperature("B", 1, 2),
            ],
        )
        .unwrap();
    let outcome = join_covariates(
        vec![history("A", 1), history("B", 1)],
        &source,
        &JoinOptions::default(),
    );
    let kinds: Vec<_> = outcome.issues.iter().map(HistoryError::kind).collect();
    assert_eq!(
        kinds,
        vec![ErrorKind::DuplicateSubject, ErrorKind::DuplicateOccasion]
    );
}

#[test]
fn name_at_both_levels_collides() {
    let mut source = CovariateSource::from_subject_records(
        "morph",
        &names(&["temp"]),
        vec![SubjectRecord::new("A").with_value("temp", 3_i64)],
    )
    .unwrap();
    source
        .add_occasion_events("weather", &names(&["temp"]), vec![temperature("A", 1, 9)])
        .unwrap();
    let outcome = join_covariates(vec![history("A", 1)], &source, &JoinOptions::default());
    assert_eq!(outcome.issues[0].kind(), ErrorKind::NameCollision);
    assert_eq!(outcome.issues[0].subject(), Some("A"));
}

#[test]
fn level_collision_ignores_case() {
    let mut source = CovariateSource::from_subject_records(
        "morph",
        &names(&["Mass"]),
        vec![SubjectRecord::new("A").with_value("Mass", 3_i64)],
    )
    .unwrap();
    source
        .add_occasion_events(
            "weights",
            &names(&["mass"]),
            vec![ObservationEvent::new("A", 1).with_value("mass", 4_i64)],
        )
        .unwrap();
    let outcome = join_covariates(vec![history("A", 1)], &source, &JoinOptions::default());
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].kind(), ErrorKind::NameCollision);
    assert_eq!(outcome.issues[0].subject(), Some("A"));
}

#[test]
fn same_level_repeat_ignores_case() {
    let mut source =
        CovariateSource::from_subject_records("morph", &names(&["sex"]), sex_table()).unwrap();
    let err = source
        .add_subject_records("genetics", &names(&["SEX"]), Vec::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameCollision);

    source
        .add_occasion_events("weather", &names(&["temp"]), Vec::new())
        .unwrap();
    let err = source
        .add_occasion_events("logger", &names(&["Temp"]), Vec::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameCollision);
}

#[test]
fn occasion_row_beyond_last_occasion_is_out_of_range() {
    let mut source = CovariateSource::new();
    source
        .add_occasion_events(
            "weather",
            &names(&["temp"]),
            vec![
                temperature("A", 1, 10),
                temperature("A", 2, 11),
                temperature("A", 4, 13),
            ],
        )
        .unwrap();
    let outcome = join_covariates(vec![history("A", 2)], &source, &JoinOptions::default());
    assert!(outcome.records.is_empty());
    assert!(matches!(
        outcome.issues.as_slice(),
        [HistoryError::OccasionOutOfRange {
            occasion: 4,
            occasions: 2,
            ..
        }]
    ));
}

#[test]
fn reserved_names_are_rejected_up_front() {
    let err = CovariateSource::from_subject_records("morph", &names(&["Freq"]), Vec::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameCollision);
    assert_eq!(err.subject(), None);
}

#[test]
fn roster_lists_subject_table_members() {
    let source = CovariateSource::from_subject_records("morph", &names(&["sex"]), sex_table())
        .unwrap();
    let roster: Vec<_> = source.roster().into_iter().collect();
    assert_eq!(roster, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn carry_forward_repeats_the_last_earlier_value() {
    let options = JoinOptions {
        fill: FillPolicy::CarryForward,
        ..JoinOptions::default()
    };
    let mut source = CovariateSource::new();
    source
        .add_occasion_events(
            "weather",
            &names(&["temp"]),
            vec![temperature("A", 1, 10), temperature("A", 3, 12), temperature("B", 2, 8)],
        )
        .unwrap();
    let outcome = join_covariates(vec![history("A", 4), history("B", 4)], &source, &options);

    assert_eq!(
        outcome.records[0].covariates.get("temp"),
        Some(&CovariateValues::Occasion(
            [10, 10, 12, 12].into_iter().map(Value::Integer).collect()
        ))
    );
    // B has nothing before occasion 2 to carry.
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].kind(), ErrorKind::MissingOccasionCovariate);
    assert_eq!(outcome.issues[0].subject(), Some("B"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn join_ignores_row_order(
            values in proptest::collection::vec(-50i64..50, 6),
            seed in any::<u64>(),
        ) {
            let rows: Vec<ObservationEvent> = values
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    let subject = if index % 2 == 0 { "A" } else { "B" };
                    let occasion = u32::try_from(index / 2 + 1).unwrap();
                    temperature(subject, occasion, *value)
                })
                .collect();
            let mut shuffled = rows.clone();
            let len = shuffled.len();
            shuffled.rotate_left(usize::try_from(seed % len as u64).unwrap());
            shuffled.reverse();

            let join = |events: Vec<ObservationEvent>| {
                let mut source = CovariateSource::new();
                source
                    .add_occasion_events("weather", &names(&["temp"]), events)
                    .unwrap();
                join_covariates(
                    vec![history("A", 3), history("B", 3)],
                    &source,
                    &JoinOptions::default(),
                )
            };
            let first = join(rows);
            let second = join(shuffled);
            prop_assert!(first.issues.is_empty());
            prop_assert_eq!(first.records, second.records);
        }
    }
}
