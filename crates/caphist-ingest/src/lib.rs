//! Raw record loading for encounter-history preparation.
//!
//! Tables are delimited text read against a [`TableSchema`] declared before
//! loading. Event tables (with an occasion column) load as
//! [`ObservationEvent`](caphist_model::ObservationEvent)s; subject-level
//! tables load as [`SubjectRecord`](caphist_model::SubjectRecord)s.

pub mod csv_table;
pub mod loader;
pub mod schema;

pub use csv_table::{CsvRow, CsvTable, read_csv_table};
pub use loader::{load_events, load_subject_records};
pub use schema::{ColumnSpec, ColumnType, TableSchema};
