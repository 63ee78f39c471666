use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ColumnName, SourceId};

/// Error type for schema resolution, parsing, IO, and pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No header matched any alias of a required column.
    #[error("missing required column '{canonical}' (searched: {})", .searched.join(", "))]
    MissingColumn {
        /// Canonical column name.
        canonical: ColumnName,
        /// Every spelling looked for.
        searched: Vec<ColumnName>,
    },
    /// A field that must be numeric could not be parsed.
    #[error("malformed row in {} at line {line}: column '{column}' has value '{value}'", .path.display())]
    MalformedRow {
        /// File containing the row.
        path: PathBuf,
        /// One-based line number.
        line: u64,
        /// Column holding the bad value.
        column: ColumnName,
        /// Raw field text.
        value: String,
    },
    /// One input aborted.
    #[error("source '{source_id}' failed: {reason}")]
    SourceFailed {
        /// Source identifier.
        source_id: SourceId,
        /// Underlying error text.
        reason: String,
    },
    /// Every input of a stage was missing or failed.
    #[error("no input file succeeded for stage '{stage}': {reason}")]
    NoSourceSucceeded {
        /// Stage name.
        stage: String,
        /// Missing and failed inputs.
        reason: String,
    },
    /// The roster produced no usable candidate.
    #[error("gender resolution mapped zero candidates for every office considered")]
    NoCandidatesMapped,
    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// CSV reader or writer failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
