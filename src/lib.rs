#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Per-file bounded-memory vote aggregation.
pub mod aggregate;
/// Command-line entry point shared by the binary.
pub mod app;
/// Runoff share classification and final municipality tables.
pub mod cohort;
/// Pipeline configuration.
pub mod config;
/// Centralized constants: column names, office codes, file layout, defaults.
pub mod constants;
/// Keys, roster records, tallies, and final rows.
pub mod data;
/// Candidate gender lookup built from the roster.
pub mod gender;
/// Legislative rollup joined with candidate gender.
pub mod join;
/// Per-stage coverage and vote balance.
pub mod metrics;
/// Stage orchestration.
pub mod pipeline;
/// Descriptive statistics, hypothesis tests, and output tables.
pub mod report;
/// Column alias resolution and join-key canonicalization.
pub mod schema;
/// Delimited sources read in bounded pages.
pub mod source;
/// Aggregate sinks and the on-disk staging spill.
pub mod staging;
/// Two-sample statistics over cohort distributions.
pub mod stats;
/// Filesystem access used by sources and writers.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Percentage and formatting helpers.
pub mod utils;

mod errors;

pub use aggregate::{
    AggregationPlan, AggregationStats, FileOutcome, RowFilter, VoteAggregate, aggregate_file,
};
pub use cohort::{
    Boundary, Cohort, CohortTables, PresidentialTable, ThresholdRule, build_cohorts,
};
pub use config::{PipelineConfig, RegionSelection};
pub use data::{CandidateRecord, GenderTally, MunicipalSummary, MunicipalityKey, VoteKey};
pub use errors::PipelineError;
pub use gender::{GenderLookup, GenderResolution, is_female, resolve_gender};
pub use join::{GenderJoin, LegislativeRow, LegislativeTable};
pub use metrics::{CoverageReport, StageCoverage};
pub use pipeline::{RunReport, run};
pub use report::{StatisticsReport, compute_statistics, write_reports};
pub use schema::{Column, SchemaMap, canonical_key};
pub use source::{DelimitedSource, ReadOptions};
pub use staging::{AggregateSink, StagingFile};
pub use types::{
    CandidateNumber, MunicipalityCode, MunicipalityName, OfficeCode, Percentage, RegionCode,
    RoundNumber, SourceId, VotableId, VoteCount,
};
