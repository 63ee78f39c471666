//! Bounded-memory vote aggregation over large section-level extracts.
//!
//! A file is read page by page. Each page is normalized, filtered
//! (round + office), and group-summed into a partial `VoteAggregate`; the
//! partial is folded into the running aggregate and the page is dropped
//! before the next one is read. Peak memory is therefore proportional to
//! the page size plus the number of distinct keys seen so far, and because
//! summation is associative the final aggregate does not depend on the page
//! size.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::data::VoteKey;
use crate::errors::PipelineError;
use crate::schema::{Column, SchemaMap, canonical_key};
use crate::source::{DelimitedSource, FieldReader, Page, ReadOptions};
use crate::types::{MunicipalityCode, OfficeCode, RoundNumber, SourceId, VoteCount};
use crate::utils::format_with_commas;

/// Row-level predicate applied after normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowFilter {
    /// Contest round to keep.
    pub round: RoundNumber,
    /// Office codes to keep.
    pub offices: Vec<OfficeCode>,
}

impl RowFilter {
    /// Keep rows of `round` cast for any of `offices`.
    pub fn new(round: RoundNumber, offices: impl Into<Vec<OfficeCode>>) -> Self {
        Self {
            round,
            offices: offices.into(),
        }
    }

    /// True when a row with these values passes the filter.
    pub fn matches(&self, round: RoundNumber, office: OfficeCode) -> bool {
        round == self.round && self.offices.contains(&office)
    }
}

/// Everything needed to aggregate one file.
#[derive(Clone, Debug)]
pub struct AggregationPlan {
    /// Identifier used in logs and coverage reports.
    pub source_id: SourceId,
    /// Row filter.
    pub filter: RowFilter,
    /// Whether the municipality name is part of the grouping key.
    pub include_name: bool,
    /// Rows per page.
    pub page_size: usize,
}

impl AggregationPlan {
    /// Plan keyed by (office, region, municipality code, votable).
    pub fn new(source_id: impl Into<SourceId>, filter: RowFilter, page_size: usize) -> Self {
        Self {
            source_id: source_id.into(),
            filter,
            include_name: false,
            page_size,
        }
    }

    /// Add (or drop) the municipality name in the grouping key.
    pub fn with_municipality_name(mut self, include_name: bool) -> Self {
        self.include_name = include_name;
        self
    }
}

/// Summed vote quantity per `VoteKey`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteAggregate {
    totals: BTreeMap<VoteKey, VoteCount>,
}

impl VoteAggregate {
    /// Empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Straightforward single-pass sum over `(key, votes)` rows.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (VoteKey, VoteCount)>,
    {
        let mut aggregate = Self::new();
        for (key, votes) in rows {
            aggregate.add(key, votes);
        }
        aggregate
    }

    /// Add `votes` to `key`.
    pub fn add(&mut self, key: VoteKey, votes: VoteCount) {
        *self.totals.entry(key).or_insert(0) += votes;
    }

    /// Fold `other` into `self`, consuming it.
    pub fn merge(&mut self, other: VoteAggregate) {
        if self.totals.is_empty() {
            self.totals = other.totals;
            return;
        }
        for (key, votes) in other.totals {
            self.add(key, votes);
        }
    }

    /// Votes recorded for `key`.
    pub fn get(&self, key: &VoteKey) -> Option<VoteCount> {
        self.totals.get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// True when no key was recorded.
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Sum over every key.
    pub fn total_votes(&self) -> VoteCount {
        self.totals.values().sum()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&VoteKey, VoteCount)> {
        self.totals.iter().map(|(key, votes)| (key, *votes))
    }
}

impl IntoIterator for VoteAggregate {
    type Item = (VoteKey, VoteCount);
    type IntoIter = btree_map::IntoIter<VoteKey, VoteCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.totals.into_iter()
    }
}

/// Counters gathered while aggregating one file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Pages read.
    pub pages: usize,
    /// Rows read across all pages.
    pub rows_read: u64,
    /// Rows that passed the filter.
    pub rows_matched: u64,
    /// Distinct keys in the final aggregate.
    pub keys: usize,
    /// Votes in the final aggregate.
    pub votes: VoteCount,
}

/// Result of aggregating one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// The file was read to the end.
    Aggregated {
        /// Votes per key.
        aggregate: VoteAggregate,
        /// Read counters.
        stats: AggregationStats,
    },
    /// The file does not exist; the caller records partial coverage.
    Missing {
        /// Path that was looked for.
        path: PathBuf,
    },
}

impl FileOutcome {
    /// The aggregate, or an empty one for a missing file.
    pub fn into_aggregate(self) -> VoteAggregate {
        match self {
            FileOutcome::Aggregated { aggregate, .. } => aggregate,
            FileOutcome::Missing { .. } => VoteAggregate::new(),
        }
    }
}

/// Header positions for every column the aggregator reads.
#[derive(Clone, Copy, Debug)]
struct VoteColumns {
    round: usize,
    office: usize,
    region: usize,
    municipality_code: usize,
    municipality_name: Option<usize>,
    votable: usize,
    votes: usize,
}

impl VoteColumns {
    fn resolve(schema: &SchemaMap, include_name: bool) -> Result<Self, PipelineError> {
        Ok(Self {
            round: schema.require(Column::Round)?,
            office: schema.require(Column::Office)?,
            region: schema.require(Column::Region)?,
            municipality_code: schema.require(Column::MunicipalityCode)?,
            municipality_name: if include_name {
                Some(schema.require(Column::MunicipalityName)?)
            } else {
                None
            },
            votable: schema.require(Column::Votable)?,
            votes: schema.require(Column::Votes)?,
        })
    }
}

/// Aggregate `path` according to `plan`.
///
/// A missing file yields `FileOutcome::Missing`. A missing required column or
/// an unparseable value in a row that must be evaluated aborts the file with
/// an error; rows are never skipped silently.
pub fn aggregate_file(
    path: &Path,
    plan: &AggregationPlan,
    options: ReadOptions,
) -> Result<FileOutcome, PipelineError> {
    let Some(mut source) = DelimitedSource::open(plan.source_id.clone(), path, options)? else {
        warn!(
            "[munivote:aggregate] '{}' file not found: {}",
            plan.source_id,
            path.display()
        );
        return Ok(FileOutcome::Missing {
            path: path.to_path_buf(),
        });
    };
    let columns = VoteColumns::resolve(source.schema(), plan.include_name)?;
    let started = Instant::now();

    let mut running = VoteAggregate::new();
    let mut rows_matched = 0u64;
    while let Some(page) = source.next_page(plan.page_size)? {
        let (partial, matched) = aggregate_page(&page, columns, &plan.filter, source.fields())?;
        drop(page);
        rows_matched += matched;
        running.merge(partial);
    }

    let stats = AggregationStats {
        pages: source.pages_read(),
        rows_read: source.rows_read(),
        rows_matched,
        keys: running.len(),
        votes: running.total_votes(),
    };
    info!(
        "[munivote:aggregate] '{}' done in {:.1}s (pages={}, rows={}, matched={}, keys={})",
        plan.source_id,
        started.elapsed().as_secs_f64(),
        stats.pages,
        format_with_commas(stats.rows_read),
        format_with_commas(stats.rows_matched),
        format_with_commas(stats.keys as u64)
    );
    Ok(FileOutcome::Aggregated {
        aggregate: running,
        stats,
    })
}

fn aggregate_page(
    page: &Page,
    columns: VoteColumns,
    filter: &RowFilter,
    fields: FieldReader<'_>,
) -> Result<(VoteAggregate, u64), PipelineError> {
    let mut partial = VoteAggregate::new();
    let mut matched = 0u64;
    for row in &page.rows {
        let round: RoundNumber = fields.integer(row, columns.round, Column::Round)?;
        let office: OfficeCode = fields.integer(row, columns.office, Column::Office)?;
        if !filter.matches(round, office) {
            continue;
        }
        let votes: VoteCount = fields.integer(row, columns.votes, Column::Votes)?;
        let municipality_code: MunicipalityCode =
            fields.integer(row, columns.municipality_code, Column::MunicipalityCode)?;
        let key = VoteKey {
            office,
            region: canonical_key(&fields.text(row, columns.region)),
            municipality_code,
            municipality_name: columns
                .municipality_name
                .map(|idx| fields.text(row, idx).trim().to_string()),
            votable: canonical_key(&fields.text(row, columns.votable)),
        };
        partial.add(key, votes);
        matched += 1;
    }
    Ok((partial, matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "NR_TURNO;CD_CARGO_PERGUNTA;SG_UF;CD_MUNICIPIO;NM_MUNICIPIO;NR_VOTAVEL;QT_VOTOS";

    fn options() -> ReadOptions {
        ReadOptions::new(b';', "latin1").unwrap()
    }

    fn key(office: OfficeCode, code: MunicipalityCode, votable: &str) -> VoteKey {
        VoteKey {
            office,
            region: "AC".to_string(),
            municipality_code: code,
            municipality_name: None,
            votable: votable.to_string(),
        }
    }

    fn write_file(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("votacao_secao_2022_AC.csv");
        let mut body = String::from(HEADER);
        body.push('\n');
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn filters_round_and_office_before_summing() {
        let temp = tempdir().unwrap();
        let path = write_file(
            temp.path(),
            &[
                "1;6;AC;100;RIO BRANCO;1234;10",
                "1;6;AC;100;RIO BRANCO;1234;5",
                "2;6;AC;100;RIO BRANCO;1234;99",
                "1;1;AC;100;RIO BRANCO;13;99",
                "1;7;AC;100;RIO BRANCO;12345;4",
            ],
        );
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 2);
        let aggregate = aggregate_file(&path, &plan, options())
            .unwrap()
            .into_aggregate();

        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate.get(&key(6, 100, "1234")), Some(15));
    }

    #[test]
    fn multiple_offices_are_kept_apart() {
        let temp = tempdir().unwrap();
        let path = write_file(
            temp.path(),
            &[
                "1;6;AC;100;RIO BRANCO;1234;10",
                "1;7;AC;100;RIO BRANCO;1234;3",
            ],
        );
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6, 7]), 10);
        let aggregate = aggregate_file(&path, &plan, options())
            .unwrap()
            .into_aggregate();
        assert_eq!(aggregate.get(&key(6, 100, "1234")), Some(10));
        assert_eq!(aggregate.get(&key(7, 100, "1234")), Some(3));
    }

    #[test]
    fn name_joins_the_key_when_requested() {
        let temp = tempdir().unwrap();
        let path = write_file(temp.path(), &["1;6;AC;100;RIO BRANCO;1234;10"]);
        let plan =
            AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 10).with_municipality_name(true);
        let aggregate = aggregate_file(&path, &plan, options())
            .unwrap()
            .into_aggregate();
        let (only_key, votes) = aggregate.iter().next().unwrap();
        assert_eq!(only_key.municipality_name.as_deref(), Some("RIO BRANCO"));
        assert_eq!(votes, 10);
    }

    #[test]
    fn missing_file_is_an_outcome_not_an_error() {
        let temp = tempdir().unwrap();
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 10);
        let outcome = aggregate_file(&temp.path().join("absent.csv"), &plan, options()).unwrap();
        assert!(matches!(outcome, FileOutcome::Missing { .. }));
        assert!(outcome.into_aggregate().is_empty());
    }

    #[test]
    fn malformed_vote_quantity_aborts_the_file() {
        let temp = tempdir().unwrap();
        let path = write_file(
            temp.path(),
            &["1;6;AC;100;RIO BRANCO;1234;10", "1;6;AC;100;RIO BRANCO;1234;x"],
        );
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 1);
        let err = aggregate_file(&path, &plan, options()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn negative_vote_quantity_is_malformed() {
        let temp = tempdir().unwrap();
        let path = write_file(temp.path(), &["1;6;AC;100;RIO BRANCO;1234;-4"]);
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 10);
        assert!(matches!(
            aggregate_file(&path, &plan, options()),
            Err(PipelineError::MalformedRow { .. })
        ));
    }

    #[test]
    fn missing_required_column_aborts_the_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("votes.csv");
        std::fs::write(&path, "NR_TURNO;CD_CARGO;SG_UF;CD_MUNICIPIO;NR_VOTAVEL\n1;6;AC;1;13\n")
            .unwrap();
        let plan = AggregationPlan::new("AC", RowFilter::new(1, vec![6]), 10);
        match aggregate_file(&path, &plan, options()) {
            Err(PipelineError::MissingColumn { canonical, .. }) => assert_eq!(canonical, "QT_VOTOS"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn merge_is_equivalent_to_single_pass() {
        let rows = vec![
            (key(6, 1, "13"), 1),
            (key(6, 1, "22"), 2),
            (key(6, 1, "13"), 3),
            (key(6, 2, "13"), 4),
        ];
        let single = VoteAggregate::from_rows(rows.clone());
        let mut folded = VoteAggregate::from_rows(rows[..1].to_vec());
        folded.merge(VoteAggregate::from_rows(rows[1..3].to_vec()));
        folded.merge(VoteAggregate::from_rows(rows[3..].to_vec()));
        assert_eq!(single, folded);
        assert_eq!(single.total_votes(), 10);
    }
}
