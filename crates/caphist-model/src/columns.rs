//! Column names reserved by the emitted table.

pub const ID_COLUMN: &str = "id";
pub const HISTORY_COLUMN: &str = "ch";
pub const FREQUENCY_COLUMN: &str = "freq";
pub const FIRST_FOUND_COLUMN: &str = "first";
pub const LAST_ACTIVE_COLUMN: &str = "lastactive";
pub const LAST_CHECKED_COLUMN: &str = "lastcheck";
pub const FATE_COLUMN: &str = "fate";

pub const RESERVED_COLUMNS: [&str; 7] = [
    ID_COLUMN,
    HISTORY_COLUMN,
    FREQUENCY_COLUMN,
    FIRST_FOUND_COLUMN,
    LAST_ACTIVE_COLUMN,
    LAST_CHECKED_COLUMN,
    FATE_COLUMN,
];

/// Case-insensitive check against [`RESERVED_COLUMNS`].
pub fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Positionally-suffixed column for an occasion-level covariate (`mass3`).
pub fn occasion_column(name: &str, occasion: u32) -> String {
    format!("{name}{occasion}")
}
