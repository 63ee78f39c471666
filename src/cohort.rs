//! Presidential runoff shares, threshold classification, and the final
//! per-municipality tables.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::aggregate::VoteAggregate;
use crate::constants::cohorts::THRESHOLD_PERCENT;
use crate::data::{MunicipalSummary, MunicipalityKey};
use crate::join::LegislativeTable;
use crate::types::{OfficeCode, Percentage, VoteCount};
use crate::utils::percentage;

/// One of the two municipality groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cohort {
    /// Winner share under the threshold.
    Lower,
    /// Winner share over the threshold.
    Upper,
}

impl Cohort {
    /// Both cohorts, lower first.
    pub const ALL: [Cohort; 2] = [Cohort::Lower, Cohort::Upper];
}

/// Which cohort a share exactly equal to the threshold belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Boundary {
    /// `share >= threshold` is upper; exactly 50% is "at or above".
    #[default]
    UpperInclusive,
    /// `share > threshold` is upper; exactly 50% is "at or below".
    LowerInclusive,
}

/// Threshold plus boundary-inclusion rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdRule {
    /// Winner share threshold in percent.
    pub threshold: Percentage,
    /// Which side an exact match falls on.
    pub boundary: Boundary,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            threshold: THRESHOLD_PERCENT,
            boundary: Boundary::default(),
        }
    }
}

impl ThresholdRule {
    /// Rule with an explicit threshold and boundary.
    pub fn new(threshold: Percentage, boundary: Boundary) -> Self {
        Self {
            threshold,
            boundary,
        }
    }

    /// Classify an unrounded winner share.
    pub fn classify(&self, share: Percentage) -> Cohort {
        let upper = match self.boundary {
            Boundary::UpperInclusive => share >= self.threshold,
            Boundary::LowerInclusive => share > self.threshold,
        };
        if upper { Cohort::Upper } else { Cohort::Lower }
    }

    /// Relation of `cohort` to the threshold (`below`, `at_or_above`, ...).
    pub fn relation(&self, cohort: Cohort) -> &'static str {
        match (self.boundary, cohort) {
            (Boundary::UpperInclusive, Cohort::Lower) => "below",
            (Boundary::UpperInclusive, Cohort::Upper) => "at_or_above",
            (Boundary::LowerInclusive, Cohort::Lower) => "at_or_below",
            (Boundary::LowerInclusive, Cohort::Upper) => "above",
        }
    }

    /// Row label, e.g. `below_50`.
    pub fn label(&self, cohort: Cohort) -> String {
        format!("{}_{}", self.relation(cohort), self.threshold)
    }

    /// Output file name of a cohort table, e.g. `municipalities_below_threshold.csv`.
    pub fn file_name(&self, prefix: &str, cohort: Cohort) -> String {
        format!("{prefix}{}_threshold.csv", self.relation(cohort))
    }
}

/// Runoff votes for the two candidates of interest in one municipality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresidentialRow {
    /// Votes for the candidate defining the cohorts.
    pub winner_votes: VoteCount,
    /// Votes for the opponent.
    pub runner_up_votes: VoteCount,
}

impl PresidentialRow {
    /// `winner / (winner + runner_up) * 100`, `0` with no votes.
    pub fn winner_share(&self) -> Percentage {
        percentage(self.winner_votes, self.winner_votes + self.runner_up_votes)
    }
}

/// Presidential runoff votes per municipality.
#[derive(Clone, Debug, Default)]
pub struct PresidentialTable {
    /// Runoff votes per municipality.
    pub rows: BTreeMap<MunicipalityKey, PresidentialRow>,
}

impl PresidentialTable {
    /// Pivot a presidential aggregate on the two candidate identifiers.
    ///
    /// Votes for any other votable are ignored; a municipality with votes for
    /// only one candidate gets zero for the other.
    pub fn from_aggregate(aggregate: &VoteAggregate, winner: &str, runner_up: &str) -> Self {
        let mut rows: BTreeMap<MunicipalityKey, PresidentialRow> = BTreeMap::new();
        for (key, votes) in aggregate.iter() {
            let slot = if key.votable == winner {
                Slot::Winner
            } else if key.votable == runner_up {
                Slot::RunnerUp
            } else {
                continue;
            };
            let row = rows.entry(key.municipality()).or_default();
            match slot {
                Slot::Winner => row.winner_votes += votes,
                Slot::RunnerUp => row.runner_up_votes += votes,
            }
        }
        Self { rows }
    }

    /// Row for `key`.
    pub fn get(&self, key: &MunicipalityKey) -> Option<&PresidentialRow> {
        self.rows.get(key)
    }

    /// Number of municipalities.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no municipality has runoff votes.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

enum Slot {
    Winner,
    RunnerUp,
}

/// Final tables: the unsplit dataset and its two cohort partitions.
#[derive(Clone, Debug)]
pub struct CohortTables {
    /// Rule the rows were classified with.
    pub rule: ThresholdRule,
    /// Every municipality present on both sides, sorted.
    pub all: Vec<MunicipalSummary>,
    /// Municipalities only in the presidential table.
    pub presidential_only: usize,
    /// Municipalities only in the legislative table.
    pub legislative_only: usize,
}

impl CohortTables {
    /// Rows of one cohort, in table order.
    pub fn cohort(&self, cohort: Cohort) -> Vec<&MunicipalSummary> {
        self.all.iter().filter(|row| row.cohort == cohort).collect()
    }

    /// One share per municipality of `cohort`, in table order.
    pub fn shares<F>(&self, cohort: Cohort, share: F) -> Vec<Percentage>
    where
        F: Fn(&MunicipalSummary) -> Percentage,
    {
        self.all
            .iter()
            .filter(|row| row.cohort == cohort)
            .map(share)
            .collect()
    }

    /// Combined women-vote shares of `cohort`.
    pub fn combined_shares(&self, cohort: Cohort) -> Vec<Percentage> {
        self.shares(cohort, MunicipalSummary::women_share_combined)
    }

    /// Number of joined municipalities.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// True when no municipality was joined.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Descending combined women share; ties by region then municipality code.
pub fn compare_rows(a: &MunicipalSummary, b: &MunicipalSummary) -> Ordering {
    b.women_share_combined()
        .total_cmp(&a.women_share_combined())
        .then_with(|| a.key.cmp(&b.key))
}

/// Inner-join presidential and legislative tables and classify each municipality.
pub fn build_cohorts(
    presidential: &PresidentialTable,
    legislative: &LegislativeTable,
    rule: ThresholdRule,
    federal_office: OfficeCode,
    state_office: OfficeCode,
) -> CohortTables {
    let mut all = Vec::with_capacity(presidential.len().min(legislative.len()));
    let mut presidential_only = 0usize;
    for (key, pres) in &presidential.rows {
        let Some(leg) = legislative.get(key) else {
            presidential_only += 1;
            continue;
        };
        let winner_share = pres.winner_share();
        all.push(MunicipalSummary {
            key: key.clone(),
            name: leg.name.clone(),
            winner_votes: pres.winner_votes,
            runner_up_votes: pres.runner_up_votes,
            winner_share,
            federal: leg.tally(federal_office),
            state: leg.tally(state_office),
            cohort: rule.classify(winner_share),
        });
    }
    let legislative_only = legislative.len() - all.len();
    all.sort_by(compare_rows);

    if presidential_only > 0 || legislative_only > 0 {
        warn!(
            "[munivote:cohort] dropped {} presidential-only and {} legislative-only municipalities",
            presidential_only, legislative_only
        );
    }
    let tables = CohortTables {
        rule,
        all,
        presidential_only,
        legislative_only,
    };
    info!(
        "[munivote:cohort] {} municipalities: {}={}, {}={}",
        tables.len(),
        rule.label(Cohort::Lower),
        tables.cohort(Cohort::Lower).len(),
        rule.label(Cohort::Upper),
        tables.cohort(Cohort::Upper).len()
    );
    tables
}
