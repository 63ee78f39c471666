use std::path::{Path, PathBuf};

use crate::cohort::ThresholdRule;
use crate::constants::{candidates, inputs, offices, outputs};
use crate::errors::PipelineError;
use crate::report::ReportLayout;
use crate::source::ReadOptions;
use crate::transport::fs::{discover_region_files, region_file_path};
use crate::types::{CandidateNumber, OfficeCode, RegionCode, RoundNumber};

/// Which per-region legislative files a run reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionSelection {
    /// Exactly these region codes, in this order.
    Fixed(Vec<RegionCode>),
    /// Every `<prefix><REGION>.csv` in the data directory except the national file.
    Discover,
}

impl Default for RegionSelection {
    fn default() -> Self {
        RegionSelection::Fixed(inputs::ALL_REGIONS.iter().map(|r| r.to_string()).collect())
    }
}

/// Every named constant of a pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory holding every input file.
    pub data_dir: PathBuf,
    /// National presidential file, relative to `data_dir`.
    pub presidential_file: PathBuf,
    /// Candidate roster, relative to `data_dir`.
    pub roster_file: PathBuf,
    /// Per-region file name prefix.
    pub region_file_prefix: String,
    /// Region suffix of the national file, skipped by discovery.
    pub national_suffix: String,
    /// Directory receiving the output tables.
    pub output_dir: PathBuf,
    /// Input field delimiter.
    pub input_delimiter: u8,
    /// Input character encoding label.
    pub encoding_label: String,
    /// Output field delimiter.
    pub output_delimiter: u8,
    /// Rows per page for ordinary files.
    pub page_size: usize,
    /// Rows per page for `large_regions`.
    pub large_region_page_size: usize,
    /// Regions read with the reduced page size.
    pub large_regions: Vec<RegionCode>,
    /// Federal deputy office code.
    pub federal_office: OfficeCode,
    /// State deputy office code.
    pub state_office: OfficeCode,
    /// Round the legislative offices are decided in.
    pub legislative_round: RoundNumber,
    /// Presidential office code.
    pub presidential_office: OfficeCode,
    /// Presidential runoff round.
    pub runoff_round: RoundNumber,
    /// Candidate whose runoff share defines the cohorts.
    pub winner_candidate: CandidateNumber,
    /// Runoff opponent.
    pub runner_up_candidate: CandidateNumber,
    /// Cohort threshold and boundary rule.
    pub threshold: ThresholdRule,
    /// Per-region legislative files to read.
    pub regions: RegionSelection,
    /// When set, regional aggregates are spilled here before the join.
    pub staging_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(inputs::DEFAULT_DATA_DIR),
            presidential_file: PathBuf::from(inputs::PRESIDENTIAL_FILE),
            roster_file: PathBuf::from(inputs::ROSTER_FILE),
            region_file_prefix: inputs::REGION_FILE_PREFIX.to_string(),
            national_suffix: inputs::NATIONAL_SUFFIX.to_string(),
            output_dir: PathBuf::from(outputs::DEFAULT_OUTPUT_DIR),
            input_delimiter: inputs::DELIMITER,
            encoding_label: inputs::ENCODING_LABEL.to_string(),
            output_delimiter: outputs::DELIMITER,
            page_size: inputs::PAGE_SIZE,
            large_region_page_size: inputs::LARGE_REGION_PAGE_SIZE,
            large_regions: inputs::LARGE_REGIONS.iter().map(|r| r.to_string()).collect(),
            federal_office: offices::FEDERAL_DEPUTY,
            state_office: offices::STATE_DEPUTY,
            legislative_round: offices::FIRST_ROUND,
            presidential_office: offices::PRESIDENT,
            runoff_round: offices::RUNOFF_ROUND,
            winner_candidate: candidates::WINNER_CANDIDATE.to_string(),
            runner_up_candidate: candidates::RUNNER_UP_CANDIDATE.to_string(),
            threshold: ThresholdRule::default(),
            regions: RegionSelection::default(),
            staging_path: None,
        }
    }
}

impl PipelineConfig {
    /// Read inputs from `data_dir`.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Write tables to `output_dir`.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Choose which region files to read.
    pub fn with_regions(mut self, regions: RegionSelection) -> Self {
        self.regions = regions;
        self
    }

    /// Use one page size for every region.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self.large_region_page_size = page_size;
        self
    }

    /// Replace the cohort threshold rule.
    pub fn with_threshold(mut self, threshold: ThresholdRule) -> Self {
        self.threshold = threshold;
        self
    }

    /// Spill regional aggregates to `staging_path` before the join; `None` folds them directly.
    pub fn with_staging_path(mut self, staging_path: Option<PathBuf>) -> Self {
        self.staging_path = staging_path;
        self
    }

    /// Legislative offices, federal first.
    pub fn legislative_offices(&self) -> Vec<OfficeCode> {
        vec![self.federal_office, self.state_office]
    }

    /// Absolute path of the presidential file.
    pub fn presidential_path(&self) -> PathBuf {
        self.data_dir.join(&self.presidential_file)
    }

    /// Absolute path of the roster.
    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join(&self.roster_file)
    }

    /// Path of the legislative file for `region`.
    pub fn region_path(&self, region: &str) -> PathBuf {
        region_file_path(&self.data_dir, &self.region_file_prefix, region)
    }

    /// Rows per page for `region`.
    pub fn page_size_for(&self, region: &str) -> usize {
        if self.large_regions.iter().any(|large| large == region) {
            self.large_region_page_size
        } else {
            self.page_size
        }
    }

    /// Delimiter and decoder for every input.
    pub fn read_options(&self) -> Result<ReadOptions, PipelineError> {
        ReadOptions::new(self.input_delimiter, &self.encoding_label)
    }

    /// Output directory and delimiter.
    pub fn report_layout(&self) -> ReportLayout {
        ReportLayout::new(&self.output_dir, self.output_delimiter)
    }

    /// Region codes and file paths to read, in processing order.
    pub fn region_files(&self) -> Result<Vec<(RegionCode, PathBuf)>, PipelineError> {
        match &self.regions {
            RegionSelection::Fixed(regions) => Ok(regions
                .iter()
                .map(|region| (region.clone(), self.region_path(region)))
                .collect()),
            RegionSelection::Discover => discover_region_files(
                &self.data_dir,
                &self.region_file_prefix,
                &self.national_suffix,
            ),
        }
    }

    /// Reject values no run can succeed with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.page_size == 0 || self.large_region_page_size == 0 {
            return Err(config_error("page size must be greater than zero"));
        }
        if self.federal_office == self.state_office {
            return Err(config_error("federal and state offices must differ"));
        }
        if self.winner_candidate.trim() == self.runner_up_candidate.trim() {
            return Err(config_error("the two candidates of interest must differ"));
        }
        if self.winner_candidate.trim().is_empty() || self.runner_up_candidate.trim().is_empty() {
            return Err(config_error("candidate identifiers must not be blank"));
        }
        if !self.threshold.threshold.is_finite() {
            return Err(config_error("threshold must be a finite percentage"));
        }
        if let RegionSelection::Fixed(regions) = &self.regions
            && regions.is_empty()
        {
            return Err(config_error("region list must not be empty"));
        }
        self.read_options()?;
        Ok(())
    }
}

fn config_error(message: &str) -> PipelineError {
    PipelineError::Configuration(message.to_string())
}

/// Resolve a directory: explicit value, then environment variable, then default.
pub fn resolve_dir(explicit: Option<&Path>, env_var: &str, default: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(env_var) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::Boundary;

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.legislative_offices(), vec![6, 7]);
        assert_eq!(config.page_size_for("SP"), 300_000);
        assert_eq!(config.page_size_for("AC"), 500_000);
        assert_eq!(
            config.region_path("AC"),
            PathBuf::from("./data/votacao_secao_2022_AC.csv")
        );
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let zero_page = PipelineConfig::default().with_page_size(0);
        assert!(matches!(
            zero_page.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let mut same_candidates = PipelineConfig::default();
        same_candidates.runner_up_candidate = "13".to_string();
        assert!(same_candidates.validate().is_err());

        let nan_threshold = PipelineConfig::default()
            .with_threshold(ThresholdRule::new(f64::NAN, Boundary::UpperInclusive));
        assert!(nan_threshold.validate().is_err());

        let mut same_offices = PipelineConfig::default();
        same_offices.state_office = same_offices.federal_office;
        assert!(same_offices.validate().is_err());

        let mut bad_encoding = PipelineConfig::default();
        bad_encoding.encoding_label = "nope".to_string();
        assert!(bad_encoding.validate().is_err());
    }

    #[test]
    fn explicit_dir_wins_over_default() {
        let dir = resolve_dir(
            Some(Path::new("/tmp/explicit")),
            "MUNIVOTE_TEST_UNSET_VARIABLE",
            ".",
        );
        assert_eq!(dir, PathBuf::from("/tmp/explicit"));
        let fallback = resolve_dir(None, "MUNIVOTE_TEST_UNSET_VARIABLE", "./data");
        assert_eq!(fallback, PathBuf::from("./data"));
    }
}
