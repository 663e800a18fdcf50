//! CSV rendering of the formatted table.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::{CsvWriter, SerWriter};
use tracing::debug;

use crate::table::FormattedTable;

/// Renders the table as comma-separated text with a header row.
pub fn render_csv(table: &FormattedTable) -> Result<Vec<u8>> {
    let mut frame = table.to_data_frame()?;
    let mut buffer: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut frame)
        .context("render formatted table as csv")?;
    debug!(
        row_count = frame.height(),
        byte_count = buffer.len(),
        "csv rendered"
    );
    Ok(buffer)
}

/// Renders the table and writes it to `path`.
pub fn write_csv(table: &FormattedTable, path: &Path) -> Result<()> {
    let bytes = render_csv(table)?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}
