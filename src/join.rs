//! Legislative vote rollup joined with candidate gender.
//!
//! Each aggregate row is left-joined against the office's `GenderLookup` on
//! `(region, votable)`. Rows with no roster match (party lists, blank and null
//! votes) stay in the municipality's denominator and never reach the women
//! numerator. Rows are then summed per `(region, municipality)` and office.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::aggregate::VoteAggregate;
use crate::data::{GenderTally, MunicipalityKey, VoteKey};
use crate::errors::PipelineError;
use crate::gender::GenderResolution;
use crate::staging::AggregateSink;
use crate::types::{MunicipalityName, OfficeCode, VoteCount};
use crate::utils::format_with_commas;

/// One municipality's legislative tallies, per office.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegislativeRow {
    /// Municipality name as written in the legislative files.
    pub name: MunicipalityName,
    /// Tally per office.
    pub by_office: BTreeMap<OfficeCode, GenderTally>,
}

impl LegislativeRow {
    /// Tally for `office`; zero when the municipality has no votes for it.
    pub fn tally(&self, office: OfficeCode) -> GenderTally {
        self.by_office.get(&office).copied().unwrap_or_default()
    }
}

/// Result of the legislative join, keyed by municipality.
#[derive(Clone, Debug, Default)]
pub struct LegislativeTable {
    /// Rows per municipality.
    pub rows: BTreeMap<MunicipalityKey, LegislativeRow>,
    /// Votes whose votable matched no roster candidate.
    pub unmatched_votes: VoteCount,
    /// Every vote folded into the table.
    pub total_votes: VoteCount,
}

impl LegislativeTable {
    /// Row for `key`.
    pub fn get(&self, key: &MunicipalityKey) -> Option<&LegislativeRow> {
        self.rows.get(key)
    }

    /// Number of municipalities.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when nothing was folded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Running join of legislative aggregates against a `GenderResolution`.
pub struct GenderJoin<'a> {
    resolution: &'a GenderResolution,
    table: LegislativeTable,
    rows_folded: u64,
}

impl<'a> GenderJoin<'a> {
    /// Empty join against `resolution`.
    pub fn new(resolution: &'a GenderResolution) -> Self {
        Self {
            resolution,
            table: LegislativeTable::default(),
            rows_folded: 0,
        }
    }

    /// Fold one aggregate row into the municipality rollup.
    pub fn fold(&mut self, key: VoteKey, votes: VoteCount) {
        let matched = self
            .resolution
            .lookup(key.office)
            .and_then(|lookup| lookup.get(&key.region, &key.votable));
        if matched.is_none() {
            self.table.unmatched_votes += votes;
        }
        self.table.total_votes += votes;
        self.rows_folded += 1;

        let office = key.office;
        let name = key.municipality_name.clone();
        let row = self.table.rows.entry(key.municipality()).or_default();
        if row.name.is_empty()
            && let Some(name) = name
        {
            row.name = name;
        }
        row.by_office
            .entry(office)
            .or_default()
            .record(votes, matched.unwrap_or(false));
    }

    /// Close the join and hand back the per-municipality table.
    pub fn finish(self) -> LegislativeTable {
        info!(
            "[munivote:join] {} municipalities from {} rows (votes={}, unmatched={})",
            self.table.len(),
            format_with_commas(self.rows_folded),
            format_with_commas(self.table.total_votes),
            format_with_commas(self.table.unmatched_votes)
        );
        self.table
    }
}

impl AggregateSink for GenderJoin<'_> {
    fn accept(&mut self, source_id: &str, aggregate: VoteAggregate) -> Result<(), PipelineError> {
        let rows = aggregate.len();
        for (key, votes) in aggregate {
            self.fold(key, votes);
        }
        debug!("[munivote:join] folded {} rows from '{}'", rows, source_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gender::GenderLookup;

    fn resolution() -> GenderResolution {
        let mut federal = GenderLookup::new(6);
        federal.insert("AC".into(), "007".into(), true);
        federal.insert("AC".into(), "1234".into(), false);
        let mut state = GenderLookup::new(7);
        state.insert("AC".into(), "55555".into(), true);
        let mut resolution = GenderResolution::default();
        resolution.lookups.insert(6, federal);
        resolution.lookups.insert(7, state);
        resolution
    }

    fn key(office: OfficeCode, code: u32, votable: &str) -> VoteKey {
        VoteKey {
            office,
            region: "AC".to_string(),
            municipality_code: code,
            municipality_name: Some(format!("CIDADE {code}")),
            votable: votable.to_string(),
        }
    }

    #[test]
    fn unmatched_votes_stay_in_denominator() {
        let resolution = resolution();
        let mut join = GenderJoin::new(&resolution);
        join.accept(
            "AC",
            VoteAggregate::from_rows([
                (key(6, 1, "007"), 30),
                (key(6, 1, "1234"), 50),
                (key(6, 1, "95"), 20),
            ]),
        )
        .unwrap();
        let table = join.finish();
        let row = table.get(&MunicipalityKey::new("AC", 1)).unwrap();
        let federal = row.tally(6);
        assert_eq!(federal.total_votes, 100);
        assert_eq!(federal.women_votes, 30);
        assert_eq!(table.unmatched_votes, 20);
        assert_eq!(row.name, "CIDADE 1");
    }

    #[test]
    fn leading_zero_votable_does_not_match_stripped_number() {
        let resolution = resolution();
        let mut join = GenderJoin::new(&resolution);
        join.fold(key(6, 1, "7"), 10);
        join.fold(key(6, 1, "007"), 5);
        let table = join.finish();
        let federal = table.get(&MunicipalityKey::new("AC", 1)).unwrap().tally(6);
        assert_eq!(federal.women_votes, 5);
        assert_eq!(federal.total_votes, 15);
    }

    #[test]
    fn offices_are_tallied_separately_and_missing_office_is_zero() {
        let resolution = resolution();
        let mut join = GenderJoin::new(&resolution);
        join.fold(key(6, 1, "007"), 10);
        join.fold(key(7, 1, "55555"), 4);
        join.fold(key(7, 2, "55555"), 8);
        let table = join.finish();
        let first = table.get(&MunicipalityKey::new("AC", 1)).unwrap();
        assert_eq!(first.tally(6).women_votes, 10);
        assert_eq!(first.tally(7).women_votes, 4);
        let second = table.get(&MunicipalityKey::new("AC", 2)).unwrap();
        assert_eq!(second.tally(6), GenderTally::default());
        assert_eq!(second.tally(7).total_votes, 8);
    }
}
