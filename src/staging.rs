//! Destinations for per-region aggregates and the optional on-disk spill.
//!
//! Regions are aggregated one at a time. Each finished regional aggregate is
//! handed to an `AggregateSink` and dropped. The in-memory sink is the join
//! rollup itself; `StagingFile` instead appends the rows to a transient file
//! that is replayed into the rollup once every region has been read.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::VoteAggregate;
use crate::data::VoteKey;
use crate::errors::PipelineError;
use crate::transport::fs::{create_output, open_append, open_input, remove_if_exists};
use crate::types::{
    MunicipalityCode, MunicipalityName, OfficeCode, RegionCode, SourceId, VotableId, VoteCount,
};

/// Receives finished per-file aggregates, in processing order.
pub trait AggregateSink {
    /// Take ownership of `aggregate` produced from `source_id`.
    fn accept(&mut self, source_id: &str, aggregate: VoteAggregate) -> Result<(), PipelineError>;
}

const STAGING_HEADER: [&str; 6] = [
    "office",
    "region",
    "municipality_code",
    "municipality_name",
    "votable",
    "votes",
];

/// One staged aggregate row. Field names match `STAGING_HEADER`.
#[derive(Debug, Serialize, Deserialize)]
struct StagedRow {
    office: OfficeCode,
    region: RegionCode,
    municipality_code: MunicipalityCode,
    municipality_name: Option<MunicipalityName>,
    votable: VotableId,
    votes: VoteCount,
}

impl StagedRow {
    fn from_entry(key: VoteKey, votes: VoteCount) -> Self {
        Self {
            office: key.office,
            region: key.region,
            municipality_code: key.municipality_code,
            municipality_name: key.municipality_name,
            votable: key.votable,
            votes,
        }
    }

    fn into_entry(self) -> (VoteKey, VoteCount) {
        (
            VoteKey {
                office: self.office,
                region: self.region,
                municipality_code: self.municipality_code,
                municipality_name: self.municipality_name,
                votable: self.votable,
            },
            self.votes,
        )
    }
}

/// Single-writer transient file of staged aggregate rows.
///
/// The first append creates the file and writes the header; later appends
/// open it in append mode and write rows only. `finish` removes the file.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    delimiter: u8,
    created: bool,
    sources: Vec<SourceId>,
    rows_written: u64,
}

impl StagingFile {
    /// Prepare a staging file at `path`, discarding any leftover from an earlier run.
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Result<Self, PipelineError> {
        let path = path.into();
        remove_if_exists(&path)?;
        Ok(Self {
            path,
            delimiter,
            created: false,
            sources: Vec::new(),
            rows_written: 0,
        })
    }

    /// Location of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sources appended so far, in order.
    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    /// Rows appended so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append every row of `aggregate`.
    pub fn append(&mut self, source_id: &str, aggregate: VoteAggregate) -> Result<(), PipelineError> {
        let file = if self.created {
            open_append(&self.path)?
        } else {
            create_output(&self.path)?
        };
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);
        if !self.created {
            writer.write_record(STAGING_HEADER)?;
            self.created = true;
        }
        let mut rows = 0u64;
        for (key, votes) in aggregate {
            writer.serialize(StagedRow::from_entry(key, votes))?;
            rows += 1;
        }
        writer.flush()?;
        self.rows_written += rows;
        self.sources.push(source_id.to_string());
        debug!(
            "[munivote:staging] appended {} rows from '{}' to {}",
            rows,
            source_id,
            self.path.display()
        );
        Ok(())
    }

    /// Stream every staged row, in append order, into `visit`.
    ///
    /// Returns the number of rows replayed. Nothing staged replays nothing.
    pub fn replay<F>(&self, mut visit: F) -> Result<u64, PipelineError>
    where
        F: FnMut(VoteKey, VoteCount) -> Result<(), PipelineError>,
    {
        let Some(file) = open_input(&self.path)? else {
            return Ok(0);
        };
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(file);
        let mut replayed = 0u64;
        for row in reader.deserialize::<StagedRow>() {
            let (key, votes) = row?.into_entry();
            visit(key, votes)?;
            replayed += 1;
        }
        Ok(replayed)
    }

    /// Remove the staging file.
    pub fn finish(self) -> Result<(), PipelineError> {
        remove_if_exists(&self.path)?;
        info!(
            "[munivote:staging] removed {} ({} rows from {} sources)",
            self.path.display(),
            self.rows_written,
            self.sources.len()
        );
        Ok(())
    }
}

impl AggregateSink for StagingFile {
    fn accept(&mut self, source_id: &str, aggregate: VoteAggregate) -> Result<(), PipelineError> {
        self.append(source_id, aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(region: &str, votable: &str) -> VoteKey {
        VoteKey {
            office: 6,
            region: region.to_string(),
            municipality_code: 1,
            municipality_name: Some("CIDADE".to_string()),
            votable: votable.to_string(),
        }
    }

    #[test]
    fn header_is_written_once_and_rows_replay_in_order() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("staging.csv");
        let mut staging = StagingFile::new(&path, b',').unwrap();
        staging
            .accept("AC", VoteAggregate::from_rows([(key("AC", "007"), 5)]))
            .unwrap();
        staging
            .accept("AL", VoteAggregate::from_rows([(key("AL", "13"), 9)]))
            .unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.matches("municipality_code").count(), 1);
        assert_eq!(staging.sources(), ["AC".to_string(), "AL".to_string()]);

        let mut replayed = Vec::new();
        let count = staging
            .replay(|key, votes| {
                replayed.push((key, votes));
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(replayed[0], (key("AC", "007"), 5));
        assert_eq!(replayed[1], (key("AL", "13"), 9));

        staging.finish().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn empty_first_append_still_writes_header() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("staging.csv");
        let mut staging = StagingFile::new(&path, b',').unwrap();
        staging.accept("AC", VoteAggregate::new()).unwrap();
        staging
            .accept("AL", VoteAggregate::from_rows([(key("AL", "13"), 1)]))
            .unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().next(), Some(STAGING_HEADER.join(",").as_str()));
        assert_eq!(staging.replay(|_, _| Ok(())).unwrap(), 1);
    }

    #[test]
    fn stale_file_is_discarded_on_new() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("staging.csv");
        std::fs::write(&path, "garbage").unwrap();
        let staging = StagingFile::new(&path, b',').unwrap();
        assert!(!path.exists());
        assert_eq!(staging.replay(|_, _| Ok(())).unwrap(), 0);
    }
}
