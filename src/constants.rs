/// Canonical column names used after schema normalization.
pub mod columns {
    /// Contest round.
    pub const ROUND: &str = "NR_TURNO";
    /// Office code (vote files may carry `CD_CARGO_PERGUNTA` instead).
    pub const OFFICE: &str = "CD_CARGO";
    /// Office description (roster only).
    pub const OFFICE_DESCRIPTION: &str = "DS_CARGO";
    /// Region code.
    pub const REGION: &str = "SG_UF";
    /// Municipality code.
    pub const MUNICIPALITY_CODE: &str = "CD_MUNICIPIO";
    /// Municipality name.
    pub const MUNICIPALITY_NAME: &str = "NM_MUNICIPIO";
    /// Votable identifier (join key, text only).
    pub const VOTABLE: &str = "NR_VOTAVEL";
    /// Vote quantity.
    pub const VOTES: &str = "QT_VOTOS";
    /// Candidate number (join key, text only).
    pub const CANDIDATE_NUMBER: &str = "NR_CANDIDATO";
    /// Declared gender category.
    pub const GENDER: &str = "DS_GENERO";
}

/// Office codes and contest rounds used by the analysis.
pub mod offices {
    use crate::types::{OfficeCode, RoundNumber};

    /// President.
    pub const PRESIDENT: OfficeCode = 1;
    /// Federal deputy.
    pub const FEDERAL_DEPUTY: OfficeCode = 6;
    /// State deputy.
    pub const STATE_DEPUTY: OfficeCode = 7;
    /// First round (legislative offices are decided here).
    pub const FIRST_ROUND: RoundNumber = 1;
    /// Runoff round.
    pub const RUNOFF_ROUND: RoundNumber = 2;
}

/// Candidate and roster literals.
pub mod candidates {
    /// Votable identifier of the candidate whose share defines the cohorts.
    pub const WINNER_CANDIDATE: &str = "13";
    /// Votable identifier of the runoff opponent.
    pub const RUNNER_UP_CANDIDATE: &str = "22";
    /// Declared-gender literal meaning "female".
    pub const FEMALE_LITERAL: &str = "FEMININO";
}

/// Cohort threshold defaults.
pub mod cohorts {
    /// Winner vote-share threshold in percent.
    pub const THRESHOLD_PERCENT: f64 = 50.0;
}

/// Input layout and paging defaults.
pub mod inputs {
    /// Default data directory.
    pub const DEFAULT_DATA_DIR: &str = "./data";
    /// Environment variable overriding the data directory.
    pub const DATA_DIR_ENV: &str = "MUNIVOTE_DATA_DIR";
    /// National presidential section-level file.
    pub const PRESIDENTIAL_FILE: &str = "votacao_secao_2022_BR.csv";
    /// Candidate roster, relative to the data directory.
    pub const ROSTER_FILE: &str = "consulta_cand_2022/consulta_cand_2022_BRASIL.csv";
    /// Per-region vote file prefix; the region code and `.csv` follow.
    pub const REGION_FILE_PREFIX: &str = "votacao_secao_2022_";
    /// Suffix of the national file, excluded from region discovery.
    pub const NATIONAL_SUFFIX: &str = "BR";
    /// Field delimiter of every input file.
    pub const DELIMITER: u8 = b';';
    /// Encoding label of every input file.
    pub const ENCODING_LABEL: &str = "latin1";
    /// Rows per page for ordinary files.
    pub const PAGE_SIZE: usize = 500_000;
    /// Rows per page for the largest regions.
    pub const LARGE_REGION_PAGE_SIZE: usize = 300_000;
    /// Regions read with the reduced page size.
    pub const LARGE_REGIONS: [&str; 7] = ["SP", "MG", "BA", "MA", "RJ", "RS", "PR"];
    /// Every region with its own legislative vote file.
    pub const ALL_REGIONS: [&str; 27] = [
        "AC", "AL", "AM", "AP", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB",
        "PE", "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
    ];
}

/// Output layout defaults.
pub mod outputs {
    /// Default output directory.
    pub const DEFAULT_OUTPUT_DIR: &str = ".";
    /// Environment variable overriding the output directory.
    pub const OUTPUT_DIR_ENV: &str = "MUNIVOTE_OUTPUT_DIR";
    /// Field delimiter of every output table.
    pub const DELIMITER: u8 = b',';
    /// Descriptive statistics per cohort.
    pub const DESCRIPTIVE_STATS_FILE: &str = "descriptive_statistics.csv";
    /// Unsplit per-municipality dataset.
    pub const DATASET_FILE: &str = "municipal_dataset.csv";
    /// Summary statistics (N/mean/median/std/min/max) per cohort.
    pub const SUMMARY_FILE: &str = "summary_statistics.csv";
    /// Hypothesis-test results.
    pub const TESTS_FILE: &str = "hypothesis_tests.csv";
    /// Prefix of the per-cohort municipality tables.
    pub const COHORT_FILE_PREFIX: &str = "municipalities_";
}

/// Statistics reporter constants.
pub mod stats {
    /// Largest smaller-sample size for the exact Mann-Whitney distribution.
    pub const MANN_WHITNEY_EXACT_MAX: usize = 8;
    /// Significance level used in the log summary.
    pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
}
