use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use caphist_cli::types::{RunMode, RunResult};
use caphist_model::{Disposition, SubjectIssue};

pub fn print_summary(result: &RunResult) {
    println!("Family: {} ({} occasions)", result.family, result.occasions);
    println!("Output: {}", result.output_dir.display());
    let report = &result.report;

    let mut table = Table::new();
    table.set_header(vec![header_cell("Stage"), header_cell("Count")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Events read"), Cell::new(report.events_read)]);
    table.add_row(vec![Cell::new("Subjects seen"), Cell::new(report.subjects_seen)]);
    table.add_row(vec![
        Cell::new("Histories built"),
        Cell::new(report.histories_built),
    ]);
    table.add_row(vec![
        Cell::new("Records joined"),
        Cell::new(report.records_joined),
    ]);
    table.add_row(vec![
        Cell::new("Records emitted"),
        if result.mode == RunMode::Check || result.aborted {
            dim_cell("-")
        } else {
            Cell::new(report.records_emitted)
        },
    ]);
    table.add_row(vec![
        Cell::new("Excluded"),
        count_cell(report.excluded_count(), Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Failed"),
        count_cell(report.failed_count(), Color::Red),
    ]);
    for (kind, count) in report.counts_by_kind() {
        table.add_row(vec![dim_cell(format!("  {kind}")), dim_cell(count)]);
    }
    println!("{table}");

    if !report.issues.is_empty() {
        print_issue_table(&report.issues);
    }
    if !result.artifacts.is_empty() {
        print_artifact_table(result);
    }
    if result.aborted {
        println!("Run aborted: nothing was written.");
    } else if result.mode == RunMode::DryRun {
        println!("Dry run: nothing was written.");
    }
}

fn print_issue_table(issues: &[SubjectIssue]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Stage"),
        header_cell("Kind"),
        header_cell("Subject"),
        header_cell("Disposition"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    for issue in issues {
        let subject = if issue.subject.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(&issue.subject)
        };
        table.add_row(vec![
            Cell::new(issue.stage.as_str()),
            Cell::new(issue.kind.as_str()),
            subject,
            disposition_cell(issue.disposition),
            Cell::new(&issue.message),
        ]);
    }
    println!("{table}");
}

fn print_artifact_table(result: &RunResult) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Bytes"),
        header_cell("SHA-256"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for artifact in &result.artifacts {
        table.add_row(vec![
            Cell::new(&artifact.file_name),
            Cell::new(artifact.bytes),
            dim_cell(&artifact.sha256),
        ]);
    }
    println!("{table}");
}

fn disposition_cell(disposition: Disposition) -> Cell {
    match disposition {
        Disposition::Excluded => Cell::new("excluded").fg(Color::Yellow),
        Disposition::Failed => Cell::new("failed")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(80);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    if table.column_count() >= 5 {
        table.set_constraints(vec![
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Fixed(20)),
            ColumnConstraint::LowerBoundary(Width::Fixed(11)),
            ColumnConstraint::UpperBoundary(Width::Percentage(60)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
