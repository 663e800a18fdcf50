use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use caphist_ingest::{
    ColumnSpec, ColumnType, TableSchema, load_events, load_subject_records, read_csv_table,
};
use caphist_model::{ErrorKind, HistoryError, Value};

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write file");
    path
}

fn capture_schema() -> TableSchema {
    TableSchema::new("animal")
        .with_occasion("occasion")
        .with_column(ColumnSpec::new("seen", ColumnType::Flag))
        .with_column(ColumnSpec::new("mass", ColumnType::Number).optional())
}

#[test]
fn loads_typed_events() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "captures.csv",
        "animal,occasion,seen,mass,observer\nA,2,1,12.5,jk\nA,4,yes,,jk\n\nB,1,0,9,lm\n",
    );
    let events = load_events(&path, &capture_schema()).expect("load events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].subject, "A");
    assert_eq!(events[0].occasion, 2);
    assert_eq!(events[0].value("seen"), Some(&Value::Integer(1)));
    assert_eq!(events[0].value("mass"), Some(&Value::Number(12.5)));
    assert_eq!(events[1].value("mass"), None);
    assert!(events[1].flag("seen"));
    assert_eq!(events[2].subject, "B");
    // undeclared columns are ignored
    assert_eq!(events[2].value("observer"), None);
}

#[test]
fn missing_declared_column_is_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "captures.csv", "animal,occasion,mass\nA,1,3\n");
    let err = load_events(&path, &capture_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert!(err.to_string().contains("seen"));
}

#[test]
fn empty_file_is_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "captures.csv", "\n\n");
    let err = load_events(&path, &capture_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn unparseable_value_is_malformed_record() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "captures.csv",
        "animal,occasion,seen,mass\nA,1,1,4\nA,2,maybe,4\n",
    );
    let err = load_events(&path, &capture_schema()).unwrap_err();
    match err {
        HistoryError::MalformedRecord {
            line,
            column,
            value,
            ..
        } => {
            assert_eq!(line, 3);
            assert_eq!(column, "seen");
            assert_eq!(value, "maybe");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_occasion_is_malformed_record() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "captures.csv", "animal,occasion,seen,mass\nA,0,1,\n");
    let err = load_events(&path, &capture_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
}

#[test]
fn empty_required_cell_is_malformed_record() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "captures.csv", "animal,occasion,seen,mass\nA,1,,2\n");
    let err = load_events(&path, &capture_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
}

#[test]
fn headers_match_case_insensitively_and_strip_bom() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "captures.csv",
        "\u{feff}Animal,OCCASION,Seen,Mass\nA,3,1,2\n",
    );
    let events = load_events(&path, &capture_schema()).expect("load events");
    assert_eq!(events[0].occasion, 3);
}

#[test]
fn semicolon_delimiter() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "captures.csv", "animal;occasion;seen;mass\nA;1;1;2,5\n");
    let schema = TableSchema::new("animal")
        .with_occasion("occasion")
        .with_column(ColumnSpec::new("seen", ColumnType::Flag))
        .with_column(ColumnSpec::new("mass", ColumnType::Text))
        .with_delimiter(b';');
    let events = load_events(&path, &schema).expect("load events");
    assert_eq!(events[0].value("mass"), Some(&Value::from("2,5")));
}

#[test]
fn subject_records_reject_occasion_column() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "morph.csv", "animal,sex\nA,F\n");
    let err = load_subject_records(&path, &capture_schema()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);

    let schema =
        TableSchema::new("animal").with_column(ColumnSpec::new("sex", ColumnType::Text));
    let records = load_subject_records(&path, &schema).expect("load records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values.get("sex"), Some(&Value::from("F")));
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = read_csv_table(&dir.path().join("absent.csv"), b',').unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}
