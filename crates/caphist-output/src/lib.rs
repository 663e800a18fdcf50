//! Emission of formatted records for external modeling engines.
//!
//! The [`FormattedTable`] fixes the column layout (identifier, history or nest
//! interval, frequency, covariates) and is rendered as CSV, MARK `.inp` text,
//! and a JSON [`EngineManifest`].

pub mod csv;
pub mod inp;
pub mod manifest;
pub mod names;
pub mod table;

pub use csv::{render_csv, write_csv};
pub use inp::render_inp;
pub use manifest::{BUILTIN_TERMS, EngineManifest, build_manifest, formula_terms};
pub use names::{DEFAULT_MAX_NAME_LENGTH, check_column_names};
pub use table::{ColumnRole, EmitOptions, FormattedTable, OutputColumn, build_formatted_table};
