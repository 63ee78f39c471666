//! Statistics over the cohort tables and the comma-separated output files.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::cohort::{Cohort, CohortTables};
use crate::constants::outputs;
use crate::constants::stats::SIGNIFICANCE_LEVEL;
use crate::data::MunicipalSummary;
use crate::errors::PipelineError;
use crate::stats::{self, Descriptives, TestOutcome};
use crate::transport::fs::create_output;

/// Descriptive statistics of one cohort.
#[derive(Clone, Debug, PartialEq)]
pub struct CohortDescriptives {
    /// Cohort described.
    pub cohort: Cohort,
    /// Row label under the threshold rule.
    pub label: String,
    /// Combined (federal + state) women-vote share.
    pub combined: Descriptives,
    /// Federal deputy women share.
    pub federal: Descriptives,
    /// State deputy women share.
    pub state: Descriptives,
}

/// One hypothesis test result.
#[derive(Clone, Debug, PartialEq)]
pub struct HypothesisTest {
    /// Row name in the tests table.
    pub name: &'static str,
    /// Statistic and p-value.
    pub outcome: TestOutcome,
    /// Significance or effect-size label.
    pub interpretation: String,
}

/// Everything the statistics reporter computes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatisticsReport {
    /// Lower cohort first.
    pub descriptives: Vec<CohortDescriptives>,
    /// t-test, Mann-Whitney U, Cohen's d, in that order.
    pub tests: Vec<HypothesisTest>,
}

/// Compute descriptives per cohort and upper-vs-lower tests on the combined share.
pub fn compute_statistics(tables: &CohortTables) -> StatisticsReport {
    let descriptives = Cohort::ALL
        .iter()
        .map(|cohort| CohortDescriptives {
            cohort: *cohort,
            label: tables.rule.label(*cohort),
            combined: Descriptives::of(&tables.combined_shares(*cohort)),
            federal: Descriptives::of(
                &tables.shares(*cohort, MunicipalSummary::women_share_federal),
            ),
            state: Descriptives::of(&tables.shares(*cohort, MunicipalSummary::women_share_state)),
        })
        .collect();

    let upper = tables.combined_shares(Cohort::Upper);
    let lower = tables.combined_shares(Cohort::Lower);
    let t = stats::t_test(&upper, &lower);
    let u = stats::mann_whitney(&upper, &lower);
    let d = stats::cohens_d(&upper, &lower);
    let tests = vec![
        HypothesisTest {
            name: "t_test",
            outcome: t,
            interpretation: significance(t.p_value),
        },
        HypothesisTest {
            name: "mann_whitney_u",
            outcome: u,
            interpretation: significance(u.p_value),
        },
        HypothesisTest {
            name: "cohens_d",
            outcome: TestOutcome {
                statistic: d,
                p_value: None,
            },
            interpretation: d
                .map(stats::effect_size_label)
                .unwrap_or("undefined")
                .to_string(),
        },
    ];
    StatisticsReport {
        descriptives,
        tests,
    }
}

fn significance(p_value: Option<f64>) -> String {
    match p_value {
        Some(p) if p < SIGNIFICANCE_LEVEL => "significant".to_string(),
        Some(_) => "not significant".to_string(),
        None => "undefined".to_string(),
    }
}

/// Where and how output tables are written.
#[derive(Clone, Debug)]
pub struct ReportLayout {
    /// Directory receiving the tables.
    pub output_dir: PathBuf,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(outputs::DEFAULT_OUTPUT_DIR),
            delimiter: outputs::DELIMITER,
        }
    }
}

impl ReportLayout {
    /// Layout writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            delimiter,
        }
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Path of the table for `cohort` under the tables' threshold rule.
    pub fn cohort_path(&self, tables: &CohortTables, cohort: Cohort) -> PathBuf {
        self.path(&tables.rule.file_name(outputs::COHORT_FILE_PREFIX, cohort))
    }
}

fn fixed2(value: f64) -> String {
    format!("{value:.2}")
}

fn optional2(value: Option<f64>) -> String {
    value.map(fixed2).unwrap_or_default()
}

fn optional4(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

const COHORT_COLUMNS: [&str; 7] = [
    "region",
    "municipality_name",
    "legislative_votes",
    "winner_share",
    "women_share_federal",
    "women_share_state",
    "women_share_combined",
];

const DATASET_COLUMNS: [&str; 15] = [
    "region",
    "municipality_code",
    "municipality_name",
    "winner_votes",
    "runner_up_votes",
    "winner_share",
    "federal_votes",
    "federal_women_votes",
    "state_votes",
    "state_women_votes",
    "legislative_votes",
    "women_share_federal",
    "women_share_state",
    "women_share_combined",
    "cohort",
];

const DESCRIPTIVE_COLUMNS: [&str; 10] = [
    "cohort",
    "count",
    "mean",
    "median",
    "mode",
    "std_dev",
    "mean_federal",
    "median_federal",
    "mean_state",
    "median_state",
];

const SUMMARY_COLUMNS: [&str; 7] = ["cohort", "n", "mean", "median", "std_dev", "min", "max"];

const TEST_COLUMNS: [&str; 4] = ["test", "statistic", "p_value", "interpretation"];

/// Field order of every row struct matches its `*_COLUMNS` header.
#[derive(Serialize)]
struct CohortTableRow<'a> {
    region: &'a str,
    municipality_name: &'a str,
    legislative_votes: u64,
    winner_share: String,
    women_share_federal: String,
    women_share_state: String,
    women_share_combined: String,
}

impl<'a> From<&'a MunicipalSummary> for CohortTableRow<'a> {
    fn from(row: &'a MunicipalSummary) -> Self {
        Self {
            region: &row.key.region,
            municipality_name: &row.name,
            legislative_votes: row.legislative_votes(),
            winner_share: fixed2(row.winner_share),
            women_share_federal: fixed2(row.women_share_federal()),
            women_share_state: fixed2(row.women_share_state()),
            women_share_combined: fixed2(row.women_share_combined()),
        }
    }
}

#[derive(Serialize)]
struct DatasetRow<'a> {
    region: &'a str,
    municipality_code: u32,
    municipality_name: &'a str,
    winner_votes: u64,
    runner_up_votes: u64,
    winner_share: String,
    federal_votes: u64,
    federal_women_votes: u64,
    state_votes: u64,
    state_women_votes: u64,
    legislative_votes: u64,
    women_share_federal: String,
    women_share_state: String,
    women_share_combined: String,
    cohort: String,
}

#[derive(Serialize)]
struct DescriptiveRow<'a> {
    cohort: &'a str,
    count: usize,
    mean: String,
    median: String,
    mode: String,
    std_dev: String,
    mean_federal: String,
    median_federal: String,
    mean_state: String,
    median_state: String,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    cohort: &'a str,
    n: usize,
    mean: String,
    median: String,
    std_dev: String,
    min: String,
    max: String,
}

#[derive(Serialize)]
struct TestRow<'a> {
    test: &'a str,
    statistic: String,
    p_value: String,
    interpretation: &'a str,
}

fn write_table<T, I>(
    path: &Path,
    delimiter: u8,
    header: &[&str],
    rows: I,
) -> Result<usize, PipelineError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let file = create_output(path)?;
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(file);
    writer.write_record(header)?;
    let mut written = 0usize;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    writer.flush()?;
    info!("[munivote:report] wrote {} ({} rows)", path.display(), written);
    Ok(written)
}

/// Write every output table and return the paths written, in order.
///
/// Headers are written explicitly, so an empty table still has one.
pub fn write_reports(
    layout: &ReportLayout,
    tables: &CohortTables,
    report: &StatisticsReport,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut written = Vec::new();

    for cohort in Cohort::ALL {
        let path = layout.cohort_path(tables, cohort);
        write_table(
            &path,
            layout.delimiter,
            &COHORT_COLUMNS,
            tables.cohort(cohort).into_iter().map(CohortTableRow::from),
        )?;
        written.push(path);
    }

    let dataset_path = layout.path(outputs::DATASET_FILE);
    write_table(
        &dataset_path,
        layout.delimiter,
        &DATASET_COLUMNS,
        tables.all.iter().map(|row| DatasetRow {
            region: &row.key.region,
            municipality_code: row.key.code,
            municipality_name: &row.name,
            winner_votes: row.winner_votes,
            runner_up_votes: row.runner_up_votes,
            winner_share: fixed2(row.winner_share),
            federal_votes: row.federal.total_votes,
            federal_women_votes: row.federal.women_votes,
            state_votes: row.state.total_votes,
            state_women_votes: row.state.women_votes,
            legislative_votes: row.legislative_votes(),
            women_share_federal: fixed2(row.women_share_federal()),
            women_share_state: fixed2(row.women_share_state()),
            women_share_combined: fixed2(row.women_share_combined()),
            cohort: tables.rule.label(row.cohort),
        }),
    )?;
    written.push(dataset_path);

    let descriptive_path = layout.path(outputs::DESCRIPTIVE_STATS_FILE);
    write_table(
        &descriptive_path,
        layout.delimiter,
        &DESCRIPTIVE_COLUMNS,
        report.descriptives.iter().map(|entry| DescriptiveRow {
            cohort: &entry.label,
            count: entry.combined.count,
            mean: optional2(entry.combined.mean),
            median: optional2(entry.combined.median),
            mode: optional2(entry.combined.mode),
            std_dev: optional2(entry.combined.std_dev),
            mean_federal: optional2(entry.federal.mean),
            median_federal: optional2(entry.federal.median),
            mean_state: optional2(entry.state.mean),
            median_state: optional2(entry.state.median),
        }),
    )?;
    written.push(descriptive_path);

    let summary_path = layout.path(outputs::SUMMARY_FILE);
    write_table(
        &summary_path,
        layout.delimiter,
        &SUMMARY_COLUMNS,
        report.descriptives.iter().map(|entry| SummaryRow {
            cohort: &entry.label,
            n: entry.combined.count,
            mean: optional2(entry.combined.mean),
            median: optional2(entry.combined.median),
            std_dev: optional2(entry.combined.std_dev),
            min: optional2(entry.combined.min),
            max: optional2(entry.combined.max),
        }),
    )?;
    written.push(summary_path);

    let tests_path = layout.path(outputs::TESTS_FILE);
    write_table(
        &tests_path,
        layout.delimiter,
        &TEST_COLUMNS,
        report.tests.iter().map(|test| TestRow {
            test: test.name,
            statistic: optional4(test.outcome.statistic),
            p_value: optional4(test.outcome.p_value),
            interpretation: &test.interpretation,
        }),
    )?;
    written.push(tests_path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::ThresholdRule;
    use crate::data::{GenderTally, MunicipalityKey};
    use tempfile::tempdir;

    fn summary(code: u32, women: u64, winner_share: f64, cohort: Cohort) -> MunicipalSummary {
        MunicipalSummary {
            key: MunicipalityKey::new("AC", code),
            name: format!("M{code}"),
            winner_votes: 0,
            runner_up_votes: 0,
            winner_share,
            federal: GenderTally {
                total_votes: 100,
                women_votes: women,
            },
            state: GenderTally::default(),
            cohort,
        }
    }

    fn tables(rows: Vec<MunicipalSummary>) -> CohortTables {
        CohortTables {
            rule: ThresholdRule::default(),
            all: rows,
            presidential_only: 0,
            legislative_only: 0,
        }
    }

    #[test]
    fn statistics_cover_both_cohorts_and_three_tests() {
        let tables = tables(vec![
            summary(1, 40, 70.0, Cohort::Upper),
            summary(2, 30, 60.0, Cohort::Upper),
            summary(3, 10, 20.0, Cohort::Lower),
            summary(4, 20, 30.0, Cohort::Lower),
        ]);
        let report = compute_statistics(&tables);
        assert_eq!(report.descriptives.len(), 2);
        assert_eq!(report.descriptives[0].label, "below_50");
        assert_eq!(report.descriptives[0].combined.mean, Some(15.0));
        assert_eq!(report.descriptives[1].combined.mean, Some(35.0));
        let names: Vec<&str> = report.tests.iter().map(|test| test.name).collect();
        assert_eq!(names, vec!["t_test", "mann_whitney_u", "cohens_d"]);
        assert_eq!(report.tests[2].outcome.p_value, None);
    }

    #[test]
    fn writes_all_tables_with_two_decimal_percentages() {
        let temp = tempdir().unwrap();
        let tables = tables(vec![
            summary(1, 40, 66.666_66, Cohort::Upper),
            summary(2, 10, 20.0, Cohort::Lower),
        ]);
        let report = compute_statistics(&tables);
        let layout = ReportLayout::new(temp.path(), b',');
        let written = write_reports(&layout, &tables, &report).unwrap();
        assert_eq!(written.len(), 6);
        assert!(written.iter().all(|path| path.exists()));

        let upper = std::fs::read_to_string(temp.path().join("municipalities_at_or_above_threshold.csv"))
            .unwrap();
        let mut lines = upper.lines();
        assert_eq!(
            lines.next(),
            Some(
                "region,municipality_name,legislative_votes,winner_share,women_share_federal,women_share_state,women_share_combined"
            )
        );
        assert_eq!(lines.next(), Some("AC,M1,100,66.67,40.00,0.00,40.00"));

        let descriptive =
            std::fs::read_to_string(temp.path().join("descriptive_statistics.csv")).unwrap();
        let lower_row = descriptive.lines().nth(1).unwrap();
        assert!(lower_row.starts_with("below_50,1,10.00,10.00,10.00,,"));
    }

    #[test]
    fn empty_cohort_table_still_has_header() {
        let temp = tempdir().unwrap();
        let tables = tables(vec![summary(1, 40, 70.0, Cohort::Upper)]);
        let report = compute_statistics(&tables);
        write_reports(&ReportLayout::new(temp.path(), b','), &tables, &report).unwrap();
        let lower =
            std::fs::read_to_string(temp.path().join("municipalities_below_threshold.csv")).unwrap();
        assert_eq!(lower.lines().count(), 1);
        assert!(lower.starts_with("region,municipality_name"));
    }
}
