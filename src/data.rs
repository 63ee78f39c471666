use serde::{Deserialize, Serialize};

pub use crate::types::{
    CandidateNumber, MunicipalityCode, MunicipalityName, OfficeCode, Percentage, RegionCode,
    RoundNumber, VotableId, VoteCount,
};

/// Grouping key of a per-file vote aggregate.
///
/// Presidential aggregates leave `municipality_name` empty; legislative ones
/// carry it so the final tables can be labelled. Ordering is derived, which
/// makes every aggregate iterate in the same order regardless of paging.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteKey {
    /// Office the votes were cast for.
    pub office: OfficeCode,
    /// Region code.
    pub region: RegionCode,
    /// Municipality code.
    pub municipality_code: MunicipalityCode,
    /// Municipality name, when part of the grouping key.
    pub municipality_name: Option<MunicipalityName>,
    /// Votable identifier, always text.
    pub votable: VotableId,
}

impl VoteKey {
    /// The municipality this key belongs to.
    pub fn municipality(&self) -> MunicipalityKey {
        MunicipalityKey {
            region: self.region.clone(),
            code: self.municipality_code,
        }
    }
}

/// Identity of a municipality across files.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MunicipalityKey {
    /// Region code.
    pub region: RegionCode,
    /// Municipality code.
    pub code: MunicipalityCode,
}

impl MunicipalityKey {
    /// Key for `code` in `region`.
    pub fn new(region: impl Into<RegionCode>, code: MunicipalityCode) -> Self {
        Self {
            region: region.into(),
            code,
        }
    }
}

/// One roster row, reduced to the fields the gender resolver reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Region code.
    pub region: RegionCode,
    /// Office code.
    pub office: OfficeCode,
    /// `None` when the roster generation has no round column.
    pub round: Option<RoundNumber>,
    /// Candidate number, kept as text.
    pub candidate_number: CandidateNumber,
    /// Declared-gender text; `None` when blank.
    pub gender: Option<String>,
    /// Office description, when the roster has one.
    pub office_description: Option<String>,
}

/// Votes cast for one office in one municipality, split by candidate gender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderTally {
    /// Every vote cast for the office (candidates, party lists, blank, null).
    pub total_votes: VoteCount,
    /// Votes cast for candidates flagged as women.
    pub women_votes: VoteCount,
}

impl GenderTally {
    /// Add `votes`, counting them toward women when `is_woman`.
    pub fn record(&mut self, votes: VoteCount, is_woman: bool) {
        self.total_votes += votes;
        if is_woman {
            self.women_votes += votes;
        }
    }

    /// Sum of two tallies.
    pub fn combined(self, other: GenderTally) -> GenderTally {
        GenderTally {
            total_votes: self.total_votes + other.total_votes,
            women_votes: self.women_votes + other.women_votes,
        }
    }

    /// Women share of all votes, `0` when no votes were cast.
    pub fn women_share(&self) -> Percentage {
        crate::utils::percentage(self.women_votes, self.total_votes)
    }
}

/// Final per-municipality row.
#[derive(Clone, Debug, PartialEq)]
pub struct MunicipalSummary {
    /// Municipality identity.
    pub key: MunicipalityKey,
    /// Municipality name from the legislative files.
    pub name: MunicipalityName,
    /// Runoff votes for the candidate defining the cohorts.
    pub winner_votes: VoteCount,
    /// Runoff votes for the opponent.
    pub runner_up_votes: VoteCount,
    /// `winner / (winner + runner_up) * 100`, `0` with no votes.
    pub winner_share: Percentage,
    /// Federal deputy tally.
    pub federal: GenderTally,
    /// State deputy tally.
    pub state: GenderTally,
    /// Cohort under the run's threshold rule.
    pub cohort: crate::cohort::Cohort,
}

impl MunicipalSummary {
    /// Federal and state tallies combined.
    pub fn combined(&self) -> GenderTally {
        self.federal.combined(self.state)
    }

    /// Total legislative votes (federal + state).
    pub fn legislative_votes(&self) -> VoteCount {
        self.combined().total_votes
    }

    /// Women share of federal deputy votes.
    pub fn women_share_federal(&self) -> Percentage {
        self.federal.women_share()
    }

    /// Women share of state deputy votes.
    pub fn women_share_state(&self) -> Percentage {
        self.state.women_share()
    }

    /// Women share of federal and state votes pooled.
    pub fn women_share_combined(&self) -> Percentage {
        self.combined().women_share()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_unmatched_votes_in_denominator_only() {
        let mut tally = GenderTally::default();
        tally.record(30, true);
        tally.record(50, false);
        tally.record(20, false);
        assert_eq!(tally.total_votes, 100);
        assert_eq!(tally.women_votes, 30);
        assert!((tally.women_share() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn empty_tally_share_is_zero() {
        assert_eq!(GenderTally::default().women_share(), 0.0);
    }

    #[test]
    fn combined_share_pools_votes_not_percentages() {
        let federal = GenderTally {
            total_votes: 100,
            women_votes: 50,
        };
        let state = GenderTally {
            total_votes: 300,
            women_votes: 30,
        };
        let combined = federal.combined(state);
        assert_eq!(combined.total_votes, 400);
        assert!((combined.women_share() - 20.0).abs() < 1e-9);
    }
}
