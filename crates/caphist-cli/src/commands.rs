use anyhow::Result;
use comfy_table::Table;

use caphist_cli::config::{JobConfig, OutputFormat};
use caphist_cli::pipeline::{RunRequest, run_job};
use caphist_cli::types::{RunMode, RunResult};
use caphist_model::ModelFamily;

use crate::cli::{CheckArgs, OutputFormatArg, RunArgs};
use crate::summary::apply_table_style;

pub fn run_families() {
    let mut table = Table::new();
    table.set_header(vec!["Family", "Engine", "Parameters", "Description"]);
    apply_table_style(&mut table);
    for family in ModelFamily::ALL {
        table.add_row(vec![
            family.as_str().to_string(),
            family.engine_tag().to_string(),
            family.parameters().join(", "),
            family.description().to_string(),
        ]);
    }
    println!("{table}");
}

pub fn run_run(args: &RunArgs) -> Result<RunResult> {
    let config = JobConfig::load(&args.config)?;
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Write
    };
    let mut request = RunRequest::from_config(config, mode);
    if let Some(dir) = &args.output_dir {
        request.output_dir.clone_from(dir);
    }
    if let Some(format) = args.format {
        request.format = match format {
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Inp => OutputFormat::Inp,
            OutputFormatArg::Both => OutputFormat::Both,
        };
    }
    request.collapse |= args.collapse;
    run_job(&request)
}

pub fn run_check(args: &CheckArgs) -> Result<RunResult> {
    let config = JobConfig::load(&args.config)?;
    run_job(&RunRequest::from_config(config, RunMode::Check))
}
