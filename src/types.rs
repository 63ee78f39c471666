/// Two-letter region (state) code.
/// Examples: `SP`, `DF`, `AC`
pub type RegionCode = String;
/// Municipality name exactly as spelled in the source extract.
/// Examples: `SÃO PAULO`, `RIO BRANCO`
pub type MunicipalityName = String;
/// Numeric municipality code from the electoral extracts.
/// Example: `71072`
pub type MunicipalityCode = u32;
/// Opaque key a vote was recorded against (candidate, party list, blank or null).
/// Never interpreted as a number; leading zeros are significant.
/// Examples: `13`, `1234`, `95`, `007`
pub type VotableId = String;
/// Candidate number from the roster, same discipline as `VotableId`.
/// Examples: `1310`, `4455`
pub type CandidateNumber = String;
/// Office code (`CD_CARGO` family).
/// Examples: `1` (president), `6` (federal deputy), `7` (state deputy)
pub type OfficeCode = u16;
/// Contest round number.
/// Examples: `1`, `2`
pub type RoundNumber = u8;
/// Summed vote quantity.
pub type VoteCount = u64;
/// Percentage value in `[0, 100]`.
pub type Percentage = f64;
/// Column name as found in (or canonicalized from) a header row.
/// Examples: `NR_VOTAVEL`, `NRVOTAVEL`, `CD_CARGO_PERGUNTA`
pub type ColumnName = String;
/// Identifier for an input file or stage in logs and coverage reports.
/// Examples: `presidential`, `roster`, `SP`
pub type SourceId = String;
