//! Delimited input sources and bounded-size paging.
//!
//! Ownership model:
//! - `DelimitedSource` owns the open reader and the resolved `SchemaMap`.
//! - `next_page` materializes at most `page_size` rows into a fresh `Page`.
//!   The caller folds the page and drops it before asking for the next one,
//!   so no page outlives its fold.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ByteRecord, ReaderBuilder};
use tracing::debug;

use crate::errors::PipelineError;
use crate::schema::{Column, SchemaMap};
use crate::transport::fs::open_input;
use crate::types::SourceId;

/// Character decoding for input fields.
pub mod decode;

pub use decode::TextDecoder;

/// How input files are tokenized and decoded.
#[derive(Clone, Copy, Debug)]
pub struct ReadOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Field decoder for the input encoding.
    pub decoder: TextDecoder,
}

impl ReadOptions {
    /// Build options from a delimiter and an encoding label.
    pub fn new(delimiter: u8, encoding_label: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            delimiter,
            decoder: TextDecoder::for_label(encoding_label)?,
        })
    }
}

/// A bounded batch of raw rows read from one source.
#[derive(Debug, Default)]
pub struct Page {
    /// Raw rows in file order.
    pub rows: Vec<ByteRecord>,
}

impl Page {
    /// Number of rows in the page.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the page holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An open semicolon-delimited extract with its resolved header.
pub struct DelimitedSource {
    source_id: SourceId,
    path: PathBuf,
    reader: csv::Reader<File>,
    schema: SchemaMap,
    options: ReadOptions,
    pages_read: usize,
    rows_read: u64,
}

impl DelimitedSource {
    /// Open `path` and resolve its header. Returns `Ok(None)` when the file is absent.
    pub fn open(
        source_id: impl Into<SourceId>,
        path: &Path,
        options: ReadOptions,
    ) -> Result<Option<Self>, PipelineError> {
        let Some(file) = open_input(path)? else {
            return Ok(None);
        };
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(file);
        let header = reader.byte_headers()?.clone();
        let schema = SchemaMap::resolve(header.iter().map(|field| options.decoder.decode(field)));
        let source_id = source_id.into();
        debug!(
            "[munivote:source] '{}' columns: {}",
            source_id,
            schema.headers().join(";")
        );
        Ok(Some(Self {
            source_id,
            path: path.to_path_buf(),
            reader,
            schema,
            options,
            pages_read: 0,
            rows_read: 0,
        }))
    }

    /// Stable identifier used in logs.
    pub fn id(&self) -> &str {
        &self.source_id
    }

    /// Path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved header.
    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    /// Rows read so far across all pages.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Pages read so far.
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Read the next page of at most `page_size` rows; `None` at end of file.
    pub fn next_page(&mut self, page_size: usize) -> Result<Option<Page>, PipelineError> {
        let page_size = page_size.max(1);
        let mut rows = Vec::with_capacity(page_size.min(65_536));
        while rows.len() < page_size {
            let mut record = ByteRecord::new();
            if !self.reader.read_byte_record(&mut record)? {
                break;
            }
            rows.push(record);
        }
        if rows.is_empty() {
            return Ok(None);
        }
        self.pages_read += 1;
        self.rows_read += rows.len() as u64;
        debug!(
            "[munivote:source] page {} from '{}' ({} rows, {} total)",
            self.pages_read,
            self.source_id,
            rows.len(),
            self.rows_read
        );
        Ok(Some(Page { rows }))
    }

    /// Row accessor bound to this source's decoder and path.
    pub fn fields(&self) -> FieldReader<'_> {
        FieldReader {
            path: &self.path,
            decoder: self.options.decoder,
        }
    }
}

/// Decodes and parses individual fields of raw rows.
#[derive(Clone, Copy)]
pub struct FieldReader<'a> {
    path: &'a Path,
    decoder: TextDecoder,
}

impl<'a> FieldReader<'a> {
    /// Decoded text of field `idx`; empty when the row is short.
    pub fn text<'r>(&self, record: &'r ByteRecord, idx: usize) -> Cow<'r, str> {
        record
            .get(idx)
            .map(|bytes| self.decoder.decode(bytes))
            .unwrap_or(Cow::Borrowed(""))
    }

    /// Decoded text of field `idx`, `None` when blank after trimming.
    pub fn optional_text(&self, record: &ByteRecord, idx: usize) -> Option<String> {
        let text = self.text(record, idx);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Parse field `idx` as an integer after trimming.
    ///
    /// Failure is a `MalformedRow` naming the file, line, and canonical column.
    pub fn integer<T: FromStr>(
        &self,
        record: &ByteRecord,
        idx: usize,
        column: Column,
    ) -> Result<T, PipelineError> {
        let text = self.text(record, idx);
        text.trim().parse::<T>().map_err(|_| PipelineError::MalformedRow {
            path: self.path.to_path_buf(),
            line: record.position().map(|pos| pos.line()).unwrap_or(0),
            column: column.canonical().to_string(),
            value: text.into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options() -> ReadOptions {
        ReadOptions::new(b';', "latin1").unwrap()
    }

    #[test]
    fn pages_never_exceed_page_size() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("votes.csv");
        let mut body = String::from("SG_UF;QT_VOTOS\n");
        for idx in 0..10 {
            body.push_str(&format!("AC;{idx}\n"));
        }
        std::fs::write(&path, body).unwrap();

        let mut source = DelimitedSource::open("AC", &path, options())
            .unwrap()
            .unwrap();
        let mut sizes = Vec::new();
        while let Some(page) = source.next_page(4).unwrap() {
            sizes.push(page.len());
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(source.rows_read(), 10);
        assert_eq!(source.pages_read(), 3);
    }

    #[test]
    fn absent_file_opens_as_none() {
        let temp = tempdir().unwrap();
        let opened = DelimitedSource::open("XX", &temp.path().join("nope.csv"), options()).unwrap();
        assert!(opened.is_none());
    }

    #[test]
    fn integer_parse_failure_reports_line_and_column() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("votes.csv");
        std::fs::write(&path, "SG_UF;QT_VOTOS\nAC;3\nAC;three\n").unwrap();

        let mut source = DelimitedSource::open("AC", &path, options())
            .unwrap()
            .unwrap();
        let page = source.next_page(10).unwrap().unwrap();
        let fields = source.fields();
        let votes: u64 = fields.integer(&page.rows[0], 1, Column::Votes).unwrap();
        assert_eq!(votes, 3);
        match fields.integer::<u64>(&page.rows[1], 1, Column::Votes) {
            Err(PipelineError::MalformedRow {
                line, column, value, ..
            }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "QT_VOTOS");
                assert_eq!(value, "three");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
