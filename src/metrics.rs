use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::aggregate::AggregationStats;
use crate::types::{SourceId, VoteCount};
use crate::utils::format_with_commas;

/// A source that was read to the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedSource {
    /// Source identifier.
    pub source: SourceId,
    /// Counters gathered while aggregating it.
    pub stats: AggregationStats,
}

/// A source whose processing aborted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedSource {
    /// Source identifier.
    pub source: SourceId,
    /// Error text.
    pub reason: String,
}

/// What happened to every source of one stage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageCoverage {
    /// Stage name.
    pub stage: String,
    /// Sources read to the end.
    pub processed: Vec<ProcessedSource>,
    /// Sources whose file was absent.
    pub missing: Vec<SourceId>,
    /// Sources that aborted with an error.
    pub failed: Vec<FailedSource>,
}

impl StageCoverage {
    /// Empty coverage for `stage`.
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Self::default()
        }
    }

    /// Record a source read to the end.
    pub fn record_processed(&mut self, source: impl Into<SourceId>, stats: AggregationStats) {
        self.processed.push(ProcessedSource {
            source: source.into(),
            stats,
        });
    }

    /// Record a source whose file was absent.
    pub fn record_missing(&mut self, source: impl Into<SourceId>) {
        self.missing.push(source.into());
    }

    /// Record a source that aborted.
    pub fn record_failed(&mut self, source: impl Into<SourceId>, reason: impl Into<String>) {
        self.failed.push(FailedSource {
            source: source.into(),
            reason: reason.into(),
        });
    }

    /// Sources attempted in this stage.
    pub fn attempted(&self) -> usize {
        self.processed.len() + self.missing.len() + self.failed.len()
    }

    /// True when some source was missing or failed.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty() || !self.failed.is_empty()
    }

    /// Missing and failed sources in one line, `"nothing attempted"` when empty.
    pub fn gaps(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing: {}", self.missing.join(", ")));
        }
        for failed in &self.failed {
            parts.push(format!("failed: {} ({})", failed.source, failed.reason));
        }
        if parts.is_empty() {
            "nothing attempted".to_string()
        } else {
            parts.join("; ")
        }
    }

    /// Aggregated votes per processed source.
    pub fn votes_by_source(&self) -> BTreeMap<SourceId, VoteCount> {
        self.processed
            .iter()
            .map(|entry| (entry.source.clone(), entry.stats.votes))
            .collect()
    }

    /// Share of aggregated votes contributed by each processed source.
    pub fn vote_skew(&self) -> Option<VoteSkew> {
        vote_skew(&self.votes_by_source())
    }
}

/// Coverage of a whole run, one entry per stage in execution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageReport {
    /// Stages in execution order.
    pub stages: Vec<StageCoverage>,
}

impl CoverageReport {
    /// Append a stage.
    pub fn push(&mut self, stage: StageCoverage) {
        self.stages.push(stage);
    }

    /// Coverage of the stage named `name`.
    pub fn stage(&self, name: &str) -> Option<&StageCoverage> {
        self.stages.iter().find(|stage| stage.stage == name)
    }

    /// True when any stage ran with partial coverage.
    pub fn is_partial(&self) -> bool {
        self.stages.iter().any(StageCoverage::is_partial)
    }

    /// Log every stage; partial coverage is surfaced at `warn`.
    pub fn log(&self) {
        for stage in &self.stages {
            info!(
                "[munivote:coverage] {}: processed={}, missing={}, failed={}",
                stage.stage,
                stage.processed.len(),
                stage.missing.len(),
                stage.failed.len()
            );
            if let Some(skew) = stage.vote_skew() {
                for entry in &skew.per_source {
                    info!(
                        "[munivote:coverage] {} '{}' votes={} share={:.2}%",
                        stage.stage,
                        entry.source,
                        format_with_commas(entry.votes),
                        entry.share * 100.0
                    );
                }
            }
            if !stage.missing.is_empty() {
                warn!(
                    "[munivote:coverage] {}: PARTIAL coverage, missing sources: {}",
                    stage.stage,
                    stage.missing.join(", ")
                );
            }
            for failed in &stage.failed {
                warn!(
                    "[munivote:coverage] {}: PARTIAL coverage, '{}' failed: {}",
                    stage.stage, failed.source, failed.reason
                );
            }
        }
    }
}

/// Balance of aggregated votes across sources.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteSkew {
    /// Votes across all sources.
    pub total: VoteCount,
    /// Number of sources.
    pub sources: usize,
    /// Smallest source total.
    pub min: VoteCount,
    /// Largest source total.
    pub max: VoteCount,
    /// Largest source's share of `total`.
    pub max_share: f64,
    /// Smallest source's share of `total`.
    pub min_share: f64,
    /// Per-source shares, largest first.
    pub per_source: Vec<SourceShare>,
}

/// One source's share of a stage's votes.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceShare {
    /// Source identifier.
    pub source: SourceId,
    /// Votes aggregated from it.
    pub votes: VoteCount,
    /// Fraction of the stage total.
    pub share: f64,
}

/// Compute vote balance from per-source totals; largest source first.
pub fn vote_skew(votes: &BTreeMap<SourceId, VoteCount>) -> Option<VoteSkew> {
    let min = *votes.values().min()?;
    let max = *votes.values().max()?;
    let total: VoteCount = votes.values().sum();
    let share = |count: VoteCount| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let mut per_source: Vec<SourceShare> = votes
        .iter()
        .map(|(source, count)| SourceShare {
            source: source.clone(),
            votes: *count,
            share: share(*count),
        })
        .collect();
    per_source.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.source.cmp(&b.source)));
    Some(VoteSkew {
        total,
        sources: votes.len(),
        min,
        max,
        max_share: share(max),
        min_share: share(min),
        per_source,
    })
}
