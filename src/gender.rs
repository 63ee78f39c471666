//! Candidate gender lookup built from the national roster.
//!
//! The roster is filtered to the offices of interest (and to the legislative
//! round when the roster carries a round column), then reduced to
//! `(region, candidate number) -> is_woman` per office. Candidate numbers are
//! kept as text exactly like votable identifiers so the two join cleanly.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::constants::candidates::FEMALE_LITERAL;
use crate::data::CandidateRecord;
use crate::errors::PipelineError;
use crate::schema::{Column, canonical_key};
use crate::source::{DelimitedSource, ReadOptions};
use crate::types::{CandidateNumber, OfficeCode, RegionCode, RoundNumber};

/// True exactly when the trimmed declared gender equals the female literal.
pub fn is_female(declared: Option<&str>) -> bool {
    declared.is_some_and(|value| value.trim() == FEMALE_LITERAL)
}

/// Counters describing how one office's lookup was built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RosterSummary {
    /// Roster rows that passed the office/round filter.
    pub rows_selected: usize,
    /// Distinct candidates flagged as women.
    pub women: usize,
    /// Distinct candidates not flagged as women.
    pub men: usize,
    /// Rows that overwrote an earlier row with the same key.
    pub duplicates: usize,
}

/// `(region, candidate number) -> is_woman` for one office.
///
/// Duplicate keys resolve last-write-wins in roster order.
#[derive(Clone, Debug, Default)]
pub struct GenderLookup {
    office: OfficeCode,
    by_region: IndexMap<RegionCode, IndexMap<CandidateNumber, bool>>,
    summary: RosterSummary,
}

impl GenderLookup {
    /// Empty lookup for `office`.
    pub fn new(office: OfficeCode) -> Self {
        Self {
            office,
            ..Self::default()
        }
    }

    /// Build the lookup for `office` from roster records.
    ///
    /// Records of other offices are skipped. A record without a round is
    /// accepted; one with a round must match `round`.
    pub fn from_records<'a, I>(office: OfficeCode, round: RoundNumber, records: I) -> Self
    where
        I: IntoIterator<Item = &'a CandidateRecord>,
    {
        let mut lookup = Self::new(office);
        for record in records {
            lookup.accept(record, round);
        }
        lookup
    }

    /// Insert `record` when it is for this office and, if it carries a round,
    /// for `round`. Returns whether the record was selected.
    pub fn accept(&mut self, record: &CandidateRecord, round: RoundNumber) -> bool {
        if record.office != self.office || record.round.is_some_and(|value| value != round) {
            return false;
        }
        self.insert(
            record.region.clone(),
            record.candidate_number.clone(),
            is_female(record.gender.as_deref()),
        );
        true
    }

    /// Record one selected roster row.
    pub fn insert(&mut self, region: RegionCode, candidate_number: CandidateNumber, is_woman: bool) {
        self.summary.rows_selected += 1;
        let previous = self
            .by_region
            .entry(region)
            .or_default()
            .insert(candidate_number, is_woman);
        match previous {
            Some(was_woman) => {
                self.summary.duplicates += 1;
                if was_woman != is_woman {
                    self.adjust_counts(was_woman, -1);
                    self.adjust_counts(is_woman, 1);
                }
            }
            None => self.adjust_counts(is_woman, 1),
        }
    }

    fn adjust_counts(&mut self, is_woman: bool, delta: isize) {
        let slot = if is_woman {
            &mut self.summary.women
        } else {
            &mut self.summary.men
        };
        *slot = slot.saturating_add_signed(delta);
    }

    /// Office this lookup was built for.
    pub fn office(&self) -> OfficeCode {
        self.office
    }

    /// Flag for a candidate, `None` when the roster has no such candidate.
    pub fn get(&self, region: &str, candidate_number: &str) -> Option<bool> {
        self.by_region.get(region)?.get(candidate_number).copied()
    }

    /// Left-join semantics: unknown candidates are not women.
    pub fn is_woman(&self, region: &str, candidate_number: &str) -> bool {
        self.get(region, candidate_number).unwrap_or(false)
    }

    /// Number of distinct candidates.
    pub fn len(&self) -> usize {
        self.summary.women + self.summary.men
    }

    /// True when no candidate was mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters gathered while building the lookup.
    pub fn summary(&self) -> RosterSummary {
        self.summary
    }
}

/// Lookups for every office of interest plus what the roster says about them.
#[derive(Clone, Debug, Default)]
pub struct GenderResolution {
    /// One lookup per requested office (possibly empty).
    pub lookups: BTreeMap<OfficeCode, GenderLookup>,
    /// Office code -> description, first spelling seen in the roster.
    pub office_descriptions: BTreeMap<OfficeCode, String>,
}

impl GenderResolution {
    /// Lookup for `office`, if it was requested.
    pub fn lookup(&self, office: OfficeCode) -> Option<&GenderLookup> {
        self.lookups.get(&office)
    }

    /// Total candidates mapped across offices.
    pub fn mapped_candidates(&self) -> usize {
        self.lookups.values().map(GenderLookup::len).sum()
    }
}

/// Read the roster at `path` and build one lookup per office in `offices`.
///
/// A missing roster is fatal (`NoSourceSucceeded`), and so is a roster that
/// maps zero candidates for every office (`NoCandidatesMapped`).
pub fn resolve_gender(
    path: &Path,
    offices: &[OfficeCode],
    round: RoundNumber,
    options: ReadOptions,
    page_size: usize,
) -> Result<GenderResolution, PipelineError> {
    let Some(mut source) = DelimitedSource::open("roster", path, options)? else {
        warn!("[munivote:roster] roster not found: {}", path.display());
        return Err(PipelineError::NoSourceSucceeded {
            stage: "roster".to_string(),
            reason: format!("file not found: {}", path.display()),
        });
    };
    info!("[munivote:roster] reading {}", path.display());

    let schema = source.schema();
    let region_idx = schema.require(Column::Region)?;
    let office_idx = schema.require(Column::Office)?;
    let number_idx = schema.require(Column::CandidateNumber)?;
    let gender_idx = schema.require(Column::Gender)?;
    let round_idx = schema.position(Column::Round);
    let description_idx = schema.position(Column::OfficeDescription);
    if round_idx.is_none() {
        info!("[munivote:roster] no round column; keeping every round");
    }

    let mut resolution = GenderResolution {
        lookups: offices
            .iter()
            .map(|office| (*office, GenderLookup::new(*office)))
            .collect(),
        office_descriptions: BTreeMap::new(),
    };

    while let Some(page) = source.next_page(page_size)? {
        let fields = source.fields();
        for row in &page.rows {
            let office: OfficeCode = fields.integer(row, office_idx, Column::Office)?;
            let Some(lookup) = resolution.lookups.get_mut(&office) else {
                continue;
            };
            let record = CandidateRecord {
                region: canonical_key(&fields.text(row, region_idx)),
                office,
                round: match round_idx {
                    Some(idx) => Some(fields.integer(row, idx, Column::Round)?),
                    None => None,
                },
                candidate_number: canonical_key(&fields.text(row, number_idx)),
                gender: fields.optional_text(row, gender_idx),
                office_description: description_idx.and_then(|idx| fields.optional_text(row, idx)),
            };
            if !lookup.accept(&record, round) {
                continue;
            }
            if let Some(description) = record.office_description
                && !resolution.office_descriptions.contains_key(&office)
            {
                resolution.office_descriptions.insert(office, description);
            }
        }
    }

    for (office, lookup) in &resolution.lookups {
        let summary = lookup.summary();
        let description = resolution
            .office_descriptions
            .get(office)
            .map(String::as_str)
            .unwrap_or("unknown office");
        info!(
            "[munivote:roster] office {} ({}): rows={}, women={}, men={}, duplicates={}",
            office,
            description,
            summary.rows_selected,
            summary.women,
            summary.men,
            summary.duplicates
        );
        if summary.duplicates > 0 {
            warn!(
                "[munivote:roster] office {}: {} duplicate candidate keys resolved last-write-wins",
                office, summary.duplicates
            );
        }
    }

    if resolution.mapped_candidates() == 0 {
        return Err(PipelineError::NoCandidatesMapped);
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(region: &str, number: &str, gender: Option<&str>) -> CandidateRecord {
        CandidateRecord {
            region: region.to_string(),
            office: 6,
            round: Some(1),
            candidate_number: number.to_string(),
            gender: gender.map(str::to_string),
            office_description: Some("DEPUTADO FEDERAL".to_string()),
        }
    }

    #[test]
    fn only_trimmed_female_literal_is_a_woman() {
        assert!(is_female(Some("FEMININO")));
        assert!(is_female(Some(" FEMININO ")));
        assert!(!is_female(Some("MASCULINO")));
        assert!(!is_female(Some("feminino")));
        assert!(!is_female(None));
    }

    #[test]
    fn lookup_resolves_padded_gender_values() {
        let records = vec![
            record("AC", "1111", Some("FEMININO")),
            record("AC", "2222", Some(" FEMININO ")),
            record("AC", "3333", Some("MASCULINO")),
            record("AC", "4444", None),
        ];
        let lookup = GenderLookup::from_records(6, 1, &records);
        assert_eq!(lookup.get("AC", "1111"), Some(true));
        assert_eq!(lookup.get("AC", "2222"), Some(true));
        assert_eq!(lookup.get("AC", "3333"), Some(false));
        assert_eq!(lookup.get("AC", "4444"), Some(false));
        assert_eq!(lookup.summary().women, 2);
        assert_eq!(lookup.summary().men, 2);
    }

    #[test]
    fn duplicate_candidate_keeps_last_row() {
        let records = vec![
            record("AC", "1111", Some("MASCULINO")),
            record("AC", "1111", Some("FEMININO")),
        ];
        let lookup = GenderLookup::from_records(6, 1, &records);
        assert_eq!(lookup.get("AC", "1111"), Some(true));
        let summary = lookup.summary();
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.rows_selected, 2);
        assert_eq!((summary.women, summary.men), (1, 0));
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn office_and_round_filters_apply_before_lookup() {
        let mut other_office = record("AC", "13", Some("FEMININO"));
        other_office.office = 1;
        let mut other_round = record("AC", "5555", Some("FEMININO"));
        other_round.round = Some(2);
        let mut roundless = record("AC", "6666", Some("FEMININO"));
        roundless.round = None;
        let records = vec![other_office, other_round, roundless];
        let lookup = GenderLookup::from_records(6, 1, &records);
        assert_eq!(lookup.get("AC", "13"), None);
        assert_eq!(lookup.get("AC", "5555"), None);
        assert_eq!(lookup.get("AC", "6666"), Some(true));
    }

    #[test]
    fn unknown_candidate_is_not_a_woman() {
        let lookup = GenderLookup::from_records(6, 1, &[record("AC", "1111", Some("FEMININO"))]);
        assert!(!lookup.is_woman("AC", "95"));
        assert!(!lookup.is_woman("AL", "1111"));
        assert!(lookup.is_woman("AC", "1111"));
    }

    fn options() -> ReadOptions {
        ReadOptions::new(b';', "latin1").unwrap()
    }

    #[test]
    fn resolves_roster_file_per_office() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("roster.csv");
        std::fs::write(
            &path,
            "SG_UF;CD_CARGO;DS_CARGO;NR_TURNO;NR_CANDIDATO;DS_GENERO\n\
             AC;6;DEPUTADO FEDERAL;1;0101; FEMININO \n\
             AC;7;DEPUTADO ESTADUAL;1;01234;MASCULINO\n\
             AC;1;PRESIDENTE;1;13;MASCULINO\n",
        )
        .unwrap();
        let resolution = resolve_gender(&path, &[6, 7], 1, options(), 2).unwrap();
        assert_eq!(resolution.mapped_candidates(), 2);
        assert_eq!(resolution.lookup(6).unwrap().get("AC", "0101"), Some(true));
        assert_eq!(resolution.lookup(6).unwrap().get("AC", "101"), None);
        assert_eq!(resolution.lookup(7).unwrap().get("AC", "01234"), Some(false));
        assert_eq!(
            resolution.office_descriptions.get(&7).map(String::as_str),
            Some("DEPUTADO ESTADUAL")
        );
    }

    fn write_roster(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("roster.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn roster_without_round_column_keeps_every_row_and_last_duplicate_wins() {
        let temp = tempdir().unwrap();
        let path = write_roster(
            temp.path(),
            "SG_UF;CD_CARGO;NR_CANDIDATO;DS_GENERO\n\
             AC;6;1111;FEMININO\n\
             AC;6;1111;MASCULINO\n\
             AC;7;22; FEMININO \n\
             AC;7;33;\n",
        );
        let resolution = resolve_gender(&path, &[6, 7], 1, options(), 2).unwrap();
        let federal = resolution.lookup(6).unwrap();
        assert_eq!(federal.get("AC", "1111"), Some(false));
        assert_eq!(federal.summary().duplicates, 1);
        assert_eq!((federal.summary().women, federal.summary().men), (0, 1));
        let state = resolution.lookup(7).unwrap();
        assert_eq!(state.get("AC", "22"), Some(true));
        assert_eq!(state.get("AC", "33"), Some(false));
        assert!(resolution.office_descriptions.is_empty());
    }

    #[test]
    fn roster_round_column_filters_other_rounds() {
        let temp = tempdir().unwrap();
        let path = write_roster(
            temp.path(),
            "SG_UF;CD_CARGO;NR_TURNO;NR_CANDIDATO;DS_GENERO\n\
             AC;6;2;5555;FEMININO\n\
             AC;6;1;6666;FEMININO\n\
             AC;1;2;13;MASCULINO\n",
        );
        let resolution = resolve_gender(&path, &[6], 1, options(), 10).unwrap();
        let federal = resolution.lookup(6).unwrap();
        assert_eq!(federal.get("AC", "5555"), None);
        assert_eq!(federal.get("AC", "6666"), Some(true));
        assert_eq!(federal.summary().rows_selected, 1);
    }

    #[test]
    fn missing_roster_is_fatal() {
        let temp = tempdir().unwrap();
        let err = resolve_gender(&temp.path().join("absent.csv"), &[6], 1, options(), 10)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoSourceSucceeded { .. }));
    }

    #[test]
    fn roster_without_candidates_of_interest_is_fatal() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("roster.csv");
        std::fs::write(
            &path,
            "SG_UF;CD_CARGO;NR_CANDIDATO;DS_GENERO\nAC;1;13;MASCULINO\n",
        )
        .unwrap();
        let err = resolve_gender(&path, &[6, 7], 1, options(), 10).unwrap_err();
        assert!(matches!(err, PipelineError::NoCandidatesMapped));
    }
}
