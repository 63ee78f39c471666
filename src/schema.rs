//! Column-name reconciliation for the electoral extract family.
//!
//! Source generations disagree on header spelling (`NR_VOTAVEL` vs
//! `NRVOTAVEL`, `CD_CARGO_PERGUNTA` vs `CD_CARGO`). `ALIAS_TABLE` lists, per
//! canonical column, the acceptable spellings in priority order; `SchemaMap`
//! resolves a header row against it once per file.
//!
//! Join keys (`NR_VOTAVEL`, `NR_CANDIDATO`) are text from the moment they are
//! read. `canonical_key` is the only conversion applied to them.

use std::collections::BTreeMap;

use crate::constants::columns;
use crate::errors::PipelineError;
use crate::types::ColumnName;

/// Columns the pipeline knows how to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Contest round.
    Round,
    /// Office code.
    Office,
    /// Office description (roster).
    OfficeDescription,
    /// Region code.
    Region,
    /// Municipality code.
    MunicipalityCode,
    /// Municipality name.
    MunicipalityName,
    /// Votable identifier.
    Votable,
    /// Vote quantity.
    Votes,
    /// Candidate number (roster).
    CandidateNumber,
    /// Declared gender (roster).
    Gender,
}

impl Column {
    /// Canonical header name after normalization.
    pub const fn canonical(self) -> &'static str {
        match self {
            Column::Round => columns::ROUND,
            Column::Office => columns::OFFICE,
            Column::OfficeDescription => columns::OFFICE_DESCRIPTION,
            Column::Region => columns::REGION,
            Column::MunicipalityCode => columns::MUNICIPALITY_CODE,
            Column::MunicipalityName => columns::MUNICIPALITY_NAME,
            Column::Votable => columns::VOTABLE,
            Column::Votes => columns::VOTES,
            Column::CandidateNumber => columns::CANDIDATE_NUMBER,
            Column::Gender => columns::GENDER,
        }
    }

    /// Accepted source spellings, highest priority first.
    pub fn aliases(self) -> &'static [&'static str] {
        ALIAS_TABLE
            .iter()
            .find(|entry| entry.column == self)
            .map(|entry| entry.spellings)
            .unwrap_or(&[])
    }
}

/// One row of the declarative alias table.
#[derive(Clone, Copy, Debug)]
pub struct ColumnAlias {
    /// Canonical column.
    pub column: Column,
    /// Acceptable spellings in priority order.
    pub spellings: &'static [&'static str],
}

/// Canonical column -> ordered acceptable spellings.
///
/// The office column prefers `CD_CARGO_PERGUNTA` (section-level vote files)
/// over `CD_CARGO` (roster and older vote files).
pub const ALIAS_TABLE: &[ColumnAlias] = &[
    ColumnAlias {
        column: Column::Round,
        spellings: &["NR_TURNO", "NRTURNO"],
    },
    ColumnAlias {
        column: Column::Office,
        spellings: &["CD_CARGO_PERGUNTA", "CDCARGOPERGUNTA", "CD_CARGO", "CDCARGO"],
    },
    ColumnAlias {
        column: Column::OfficeDescription,
        spellings: &["DS_CARGO", "DSCARGO", "DS_CARGO_PERGUNTA", "DSCARGOPERGUNTA"],
    },
    ColumnAlias {
        column: Column::Region,
        spellings: &["SG_UF", "SGUF"],
    },
    ColumnAlias {
        column: Column::MunicipalityCode,
        spellings: &["CD_MUNICIPIO", "CDMUNICIPIO"],
    },
    ColumnAlias {
        column: Column::MunicipalityName,
        spellings: &["NM_MUNICIPIO", "NMMUNICIPIO"],
    },
    ColumnAlias {
        column: Column::Votable,
        spellings: &["NR_VOTAVEL", "NRVOTAVEL"],
    },
    ColumnAlias {
        column: Column::Votes,
        spellings: &["QT_VOTOS", "QTVOTOS"],
    },
    ColumnAlias {
        column: Column::CandidateNumber,
        spellings: &["NR_CANDIDATO", "NRCANDIDATO"],
    },
    ColumnAlias {
        column: Column::Gender,
        spellings: &["DS_GENERO", "DSGENERO"],
    },
];

/// Header row resolved against `ALIAS_TABLE`.
///
/// Every recognized column maps to exactly one header position, so a file
/// carrying both `CD_CARGO_PERGUNTA` and `CD_CARGO` never yields two office
/// columns. Unrecognized headers are left untouched.
#[derive(Clone, Debug)]
pub struct SchemaMap {
    positions: BTreeMap<Column, usize>,
    headers: Vec<ColumnName>,
}

impl SchemaMap {
    /// Resolve a header row. Never fails; missing columns surface in `require`.
    pub fn resolve<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<ColumnName> = headers
            .into_iter()
            .map(|header| clean_header(header.as_ref()))
            .collect();
        let mut positions = BTreeMap::new();
        for entry in ALIAS_TABLE {
            let found = entry
                .spellings
                .iter()
                .find_map(|spelling| raw.iter().position(|header| header == spelling));
            if let Some(idx) = found {
                positions.insert(entry.column, idx);
            }
        }
        let mut headers = raw;
        for (column, idx) in &positions {
            let canonical = column.canonical();
            let taken = headers
                .iter()
                .enumerate()
                .any(|(other, header)| other != *idx && header == canonical);
            if !taken {
                headers[*idx] = canonical.to_string();
            }
        }
        Self { positions, headers }
    }

    /// Header row with every recognized alias renamed to its canonical name.
    pub fn headers(&self) -> &[ColumnName] {
        &self.headers
    }

    /// Position of `column`, if any alias was present.
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// True when any alias of `column` was present.
    pub fn contains(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// Position of `column`, or `MissingColumn` naming every spelling searched.
    pub fn require(&self, column: Column) -> Result<usize, PipelineError> {
        self.position(column)
            .ok_or_else(|| PipelineError::MissingColumn {
                canonical: column.canonical().to_string(),
                searched: column
                    .aliases()
                    .iter()
                    .map(|spelling| spelling.to_string())
                    .collect(),
            })
    }
}

/// Canonical text form of a join-key field.
///
/// Surrounding whitespace is padding, not content, and is removed. Nothing
/// else changes: `"007"` stays `"007"` and `"13.0"` stays `"13.0"`.
pub fn canonical_key(raw: &str) -> String {
    raw.trim().to_string()
}

fn clean_header(raw: &str) -> ColumnName {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_aliases_to_canonical_names() {
        let schema = SchemaMap::resolve(["NRTURNO", "SGUF", "NRVOTAVEL", "QTVOTOS", "EXTRA"]);
        assert_eq!(
            schema.headers(),
            &["NR_TURNO", "SG_UF", "NR_VOTAVEL", "QT_VOTOS", "EXTRA"]
        );
        assert_eq!(schema.position(Column::Votable), Some(2));
        assert!(!schema.contains(Column::Office));
    }

    #[test]
    fn canonical_spelling_wins_without_duplicating() {
        let schema = SchemaMap::resolve(["NR_VOTAVEL", "NRVOTAVEL"]);
        assert_eq!(schema.position(Column::Votable), Some(0));
        assert_eq!(schema.headers(), &["NR_VOTAVEL", "NRVOTAVEL"]);
    }

    #[test]
    fn office_prefers_question_column() {
        let schema = SchemaMap::resolve(["CD_CARGO", "CD_CARGO_PERGUNTA"]);
        assert_eq!(schema.position(Column::Office), Some(1));
        assert_eq!(schema.headers(), &["CD_CARGO", "CD_CARGO_PERGUNTA"]);

        let roster = SchemaMap::resolve(["CD_CARGO", "DS_CARGO"]);
        assert_eq!(roster.position(Column::Office), Some(0));
    }

    #[test]
    fn missing_column_reports_searched_aliases() {
        let schema = SchemaMap::resolve(["SG_UF"]);
        let err = schema.require(Column::Votes).unwrap_err();
        match err {
            PipelineError::MissingColumn {
                canonical,
                searched,
            } => {
                assert_eq!(canonical, "QT_VOTOS");
                assert_eq!(searched, vec!["QT_VOTOS", "QTVOTOS"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn header_whitespace_and_bom_are_ignored() {
        let schema = SchemaMap::resolve(["\u{feff}SG_UF", " QT_VOTOS "]);
        assert_eq!(schema.position(Column::Region), Some(0));
        assert_eq!(schema.position(Column::Votes), Some(1));
    }

    #[test]
    fn canonical_key_keeps_leading_zeros() {
        assert_eq!(canonical_key("007"), "007");
        assert_eq!(canonical_key(" 0013 "), "0013");
        assert_eq!(canonical_key("13.0"), "13.0");
    }
}
