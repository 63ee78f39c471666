//! End-to-end run: presidential aggregate, roster lookup, legislative join,
//! cohorts, statistics, and output tables.
//!
//! Stages run strictly in sequence. Each stage owns its intermediate tables
//! and hands only its reduced result to the next one, so a regional
//! aggregate never outlives its fold into the join.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::aggregate::{AggregationPlan, FileOutcome, RowFilter, aggregate_file};
use crate::cohort::{CohortTables, PresidentialTable, build_cohorts};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::gender::{GenderResolution, RosterSummary, resolve_gender};
use crate::join::{GenderJoin, LegislativeTable};
use crate::metrics::{CoverageReport, StageCoverage};
use crate::report::{StatisticsReport, compute_statistics, write_reports};
use crate::source::ReadOptions;
use crate::staging::{AggregateSink, StagingFile};
use crate::types::OfficeCode;
use crate::utils::format_with_commas;

/// Stage name of the presidential aggregate in logs and coverage.
pub const PRESIDENTIAL_STAGE: &str = "presidential";
/// Stage name of the per-region legislative aggregates.
pub const LEGISLATIVE_STAGE: &str = "legislative";

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Joined municipalities and their cohorts.
    pub tables: CohortTables,
    /// Descriptives and hypothesis tests.
    pub statistics: StatisticsReport,
    /// Per-stage source coverage.
    pub coverage: CoverageReport,
    /// Roster counters per legislative office.
    pub roster: BTreeMap<OfficeCode, RosterSummary>,
    /// Output files, in write order.
    pub outputs: Vec<PathBuf>,
}

/// Run the whole pipeline with `config`.
pub fn run(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    config.validate()?;
    let options = config.read_options()?;
    let started = Instant::now();
    info!(
        "[munivote] data_dir={}, output_dir={}, encoding={}",
        config.data_dir.display(),
        config.output_dir.display(),
        options.decoder.name()
    );

    let mut coverage = CoverageReport::default();
    let presidential = presidential_stage(config, options, &mut coverage)?;

    let resolution = resolve_gender(
        &config.roster_path(),
        &config.legislative_offices(),
        config.legislative_round,
        options,
        config.page_size,
    )?;
    let roster = resolution
        .lookups
        .iter()
        .map(|(office, lookup)| (*office, lookup.summary()))
        .collect();

    let legislative = legislative_stage(config, options, &resolution, &mut coverage)?;
    drop(resolution);

    let tables = build_cohorts(
        &presidential,
        &legislative,
        config.threshold,
        config.federal_office,
        config.state_office,
    );
    drop(presidential);
    drop(legislative);
    if tables.is_empty() {
        warn!("[munivote:cohort] no municipality is present in both presidential and legislative data");
    }

    let statistics = compute_statistics(&tables);
    let outputs = write_reports(&config.report_layout(), &tables, &statistics)?;

    coverage.log();
    info!(
        "[munivote] finished in {:.1}s ({} municipalities, {} files written)",
        started.elapsed().as_secs_f64(),
        tables.len(),
        outputs.len()
    );
    Ok(RunReport {
        tables,
        statistics,
        coverage,
        roster,
        outputs,
    })
}

fn presidential_stage(
    config: &PipelineConfig,
    options: ReadOptions,
    coverage: &mut CoverageReport,
) -> Result<PresidentialTable, PipelineError> {
    let path = config.presidential_path();
    let plan = AggregationPlan::new(
        PRESIDENTIAL_STAGE,
        RowFilter::new(config.runoff_round, vec![config.presidential_office]),
        config.page_size,
    );
    info!("[munivote:presidential] reading {}", path.display());

    let mut stage = StageCoverage::new(PRESIDENTIAL_STAGE);
    let outcome = aggregate_file(&path, &plan, options);
    let aggregate = match outcome {
        Ok(FileOutcome::Aggregated { aggregate, stats }) => {
            stage.record_processed(PRESIDENTIAL_STAGE, stats);
            aggregate
        }
        Ok(FileOutcome::Missing { path }) => {
            warn!("[munivote:presidential] file not found: {}", path.display());
            stage.record_missing(PRESIDENTIAL_STAGE);
            coverage.push(stage);
            return Err(PipelineError::NoSourceSucceeded {
                stage: PRESIDENTIAL_STAGE.to_string(),
                reason: format!("file not found: {}", path.display()),
            });
        }
        Err(err) => {
            warn!("[munivote:presidential] failed: {err}");
            let reason = err.to_string();
            stage.record_failed(PRESIDENTIAL_STAGE, reason.clone());
            coverage.push(stage);
            return Err(PipelineError::NoSourceSucceeded {
                stage: PRESIDENTIAL_STAGE.to_string(),
                reason,
            });
        }
    };
    coverage.push(stage);

    let table = PresidentialTable::from_aggregate(
        &aggregate,
        &config.winner_candidate,
        &config.runner_up_candidate,
    );
    info!(
        "[munivote:presidential] {} municipalities with votes for '{}' or '{}'",
        format_with_commas(table.len() as u64),
        config.winner_candidate,
        config.runner_up_candidate
    );
    Ok(table)
}

fn legislative_stage(
    config: &PipelineConfig,
    options: ReadOptions,
    resolution: &GenderResolution,
    coverage: &mut CoverageReport,
) -> Result<LegislativeTable, PipelineError> {
    let regions = config.region_files()?;
    let filter = RowFilter::new(config.legislative_round, config.legislative_offices());
    let mut stage = StageCoverage::new(LEGISLATIVE_STAGE);
    let mut join = GenderJoin::new(resolution);
    let mut staging = match &config.staging_path {
        Some(path) => Some(StagingFile::new(path, config.output_delimiter)?),
        None => None,
    };
    info!(
        "[munivote:legislative] {} regions, offices {:?}, staging={}",
        regions.len(),
        filter.offices,
        staging
            .as_ref()
            .map(|file| file.path().display().to_string())
            .unwrap_or_else(|| "off".to_string())
    );

    {
        let sink: &mut dyn AggregateSink = match staging.as_mut() {
            Some(file) => file,
            None => &mut join,
        };
        let total = regions.len();
        for (idx, (region, path)) in regions.into_iter().enumerate() {
            let page_size = config.page_size_for(&region);
            info!(
                "[munivote:legislative] region {} ({}/{}), page_size={}",
                region,
                idx + 1,
                total,
                format_with_commas(page_size as u64)
            );
            let plan = AggregationPlan::new(region.clone(), filter.clone(), page_size)
                .with_municipality_name(true);
            match aggregate_file(&path, &plan, options) {
                Ok(FileOutcome::Aggregated { aggregate, stats }) => {
                    stage.record_processed(region.clone(), stats);
                    sink.accept(&region, aggregate)?;
                }
                Ok(FileOutcome::Missing { path }) => {
                    warn!(
                        "[munivote:legislative] region {} skipped, file not found: {} (coverage will be partial)",
                        region,
                        path.display()
                    );
                    stage.record_missing(region);
                }
                Err(err) => {
                    warn!(
                        "[munivote:legislative] region {} failed: {} (coverage will be partial)",
                        region, err
                    );
                    stage.record_failed(region, err.to_string());
                }
            }
        }
    }

    if let Some(file) = staging {
        let replayed = file.replay(|key, votes| {
            join.fold(key, votes);
            Ok(())
        })?;
        info!(
            "[munivote:legislative] replayed {} staged rows",
            format_with_commas(replayed)
        );
        file.finish()?;
    }

    let failure = stage.processed.is_empty().then(|| stage.gaps());
    info!(
        "[munivote:legislative] done: processed={}, missing={}, failed={}",
        stage.processed.len(),
        stage.missing.len(),
        stage.failed.len()
    );
    coverage.push(stage);
    if let Some(reason) = failure {
        return Err(PipelineError::NoSourceSucceeded {
            stage: LEGISLATIVE_STAGE.to_string(),
            reason,
        });
    }
    Ok(join.finish())
}
