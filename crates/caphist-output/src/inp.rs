//! MARK `.inp` rendering.
//!
//! One line per record: the subject identifier as a comment, then the history
//! (or the four nest interval fields), the frequency, and every covariate
//! column, terminated by `;`. The engine reads covariates as numbers only.

use caphist_model::{HistoryError, Result, Value};

use crate::table::{Cell, ColumnRole, FormattedTable};

/// Renders the table as `.inp` text.
///
/// # Errors
///
/// `NonNumericCovariate` when a covariate cell is text or missing.
pub fn render_inp(table: &FormattedTable) -> Result<String> {
    let mut out = String::new();
    for record in table.records() {
        let cells = table.cells(record);
        let mut fields: Vec<String> = Vec::with_capacity(cells.len());
        for (column, cell) in table.columns().iter().zip(&cells) {
            if column.role == ColumnRole::Identifier {
                if let Cell::Text(subject) = cell {
                    fields.push(format!("/* {} */", subject.replace("*/", "* /")));
                }
                continue;
            }
            let field = match cell {
                Cell::Text(text) => text.clone(),
                Cell::Count(count) => count.to_string(),
                Cell::Value(Value::Text(text)) => return Err(non_numeric(&column.name, text)),
                Cell::Value(value) => value.render(),
                Cell::Missing => return Err(non_numeric(&column.name, "")),
            };
            fields.push(field);
        }
        out.push_str(&fields.join(" "));
        out.push_str(";\n");
    }
    Ok(out)
}

fn non_numeric(column: &str, value: &str) -> HistoryError {
    HistoryError::NonNumericCovariate {
        column: column.to_string(),
        value: value.to_string(),
    }
}
