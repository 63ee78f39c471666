use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use crate::cohort::Cohort;
use crate::config::{PipelineConfig, resolve_dir};
use crate::constants::{inputs, outputs};
use crate::pipeline::{self, RunReport};
use crate::utils::format_with_commas;

#[derive(Debug, Parser)]
#[command(
    name = "munivote",
    disable_help_subcommand = true,
    about = "Municipal runoff cohorts vs. women's legislative vote share",
    long_about = "Aggregate section-level vote files per municipality, join legislative votes with candidate gender, split municipalities by runoff vote share, and write descriptive statistics and hypothesis tests.",
    after_help = "Directories are resolved in order by explicit arg, environment variables (MUNIVOTE_DATA_DIR, MUNIVOTE_OUTPUT_DIR), then project defaults."
)]
struct MunivoteCli {
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        help = "Directory holding the presidential, roster, and per-region vote files"
    )]
    data_dir: Option<PathBuf>,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        help = "Directory receiving the output tables"
    )]
    output_dir: Option<PathBuf>,
}

/// Parse `args_iter` (without the program name), run the pipeline, print a report.
pub fn run_pipeline_app<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let Some(cli) =
        parse_cli::<MunivoteCli, _>(std::iter::once("munivote".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let config = PipelineConfig::default()
        .with_data_dir(resolve_dir(
            cli.data_dir.as_deref(),
            inputs::DATA_DIR_ENV,
            inputs::DEFAULT_DATA_DIR,
        ))
        .with_output_dir(resolve_dir(
            cli.output_dir.as_deref(),
            outputs::OUTPUT_DIR_ENV,
            outputs::DEFAULT_OUTPUT_DIR,
        ));

    let report = pipeline::run(&config)?;
    print_report(&report);
    Ok(())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn print_report(report: &RunReport) {
    let tables = &report.tables;
    println!("=== municipal cohorts ===");
    println!("municipalities : {}", format_with_commas(tables.len() as u64));
    for cohort in Cohort::ALL {
        println!(
            "{:<15}: {}",
            tables.rule.label(cohort),
            tables.cohort(cohort).len()
        );
    }
    println!(
        "dropped        : {} presidential-only, {} legislative-only",
        tables.presidential_only, tables.legislative_only
    );

    println!();
    println!("=== roster ===");
    for (office, summary) in &report.roster {
        println!(
            "office {:<8}: women={}, men={}, duplicates={}",
            office, summary.women, summary.men, summary.duplicates
        );
    }

    println!();
    println!("=== combined women-vote share ===");
    for entry in &report.statistics.descriptives {
        let stats = &entry.combined;
        println!("--- {} ---", entry.label);
        println!("n      : {}", stats.count);
        println!("mean   : {}", display2(stats.mean));
        println!("median : {}", display2(stats.median));
        println!("mode   : {}", display2(stats.mode));
        println!("std    : {}", display2(stats.std_dev));
    }

    println!();
    println!("=== hypothesis tests (upper vs. lower) ===");
    for test in &report.statistics.tests {
        println!(
            "{:<15}: statistic={} p={} ({})",
            test.name,
            display4(test.outcome.statistic),
            display4(test.outcome.p_value),
            test.interpretation
        );
    }

    println!();
    println!("=== coverage ===");
    for stage in &report.coverage.stages {
        println!(
            "{:<15}: processed={}, missing={}, failed={}",
            stage.stage,
            stage.processed.len(),
            stage.missing.len(),
            stage.failed.len()
        );
        if !stage.missing.is_empty() {
            println!("  missing: {}", stage.missing.join(", "));
        }
        for failed in &stage.failed {
            println!("  failed : {} ({})", failed.source, failed.reason);
        }
    }
    if report.coverage.is_partial() {
        println!("WARNING: results cover only part of the regions listed above");
    }

    println!();
    println!("=== outputs ===");
    for path in &report.outputs {
        println!("{}", path.display());
    }
}

fn display2(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn display4(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "n/a".to_string())
}
