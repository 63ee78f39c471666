use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::PipelineError;
use crate::types::RegionCode;

/// Open an input file, mapping "not found" to `Ok(None)`.
///
/// Absent inputs are a coverage concern for the caller, not an error. Any
/// other IO failure (permissions, a directory in place of a file) propagates.
pub fn open_input(path: &Path) -> Result<Option<File>, PipelineError> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Create (truncate) an output file, creating parent directories as needed.
pub fn create_output(path: &Path) -> Result<File, PipelineError> {
    ensure_parent_dir(path)?;
    Ok(File::create(path)?)
}

/// Open an output file for appending. The file must already exist.
pub fn open_append(path: &Path) -> Result<File, PipelineError> {
    Ok(OpenOptions::new().append(true).open(path)?)
}

/// Remove a file if present. Missing files are not an error.
pub fn remove_if_exists(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Path of the per-region vote file: `<data_dir>/<prefix><REGION>.csv`.
pub fn region_file_path(data_dir: &Path, prefix: &str, region: &str) -> PathBuf {
    data_dir.join(format!("{prefix}{region}.csv"))
}

/// Region code encoded as the file-name suffix, if `path` follows the layout.
///
/// `votacao_secao_2022_SP.csv` with prefix `votacao_secao_2022_` yields `SP`.
pub fn region_from_file_name(path: &Path, prefix: &str) -> Option<RegionCode> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix(prefix)?;
    let (region, ext) = stem.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case("csv") || region.is_empty() {
        return None;
    }
    Some(region.to_string())
}

/// List per-region vote files directly under `data_dir`, sorted by region.
///
/// Files whose suffix equals `excluded_suffix` (the national file) are skipped.
pub fn discover_region_files(
    data_dir: &Path,
    prefix: &str,
    excluded_suffix: &str,
) -> Result<Vec<(RegionCode, PathBuf)>, PipelineError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(data_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            PipelineError::Io(
                err.into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(region) = region_from_file_name(entry.path(), prefix)
            && region != excluded_suffix
        {
            found.push((region, entry.path().to_path_buf()));
        }
    }
    found.sort();
    Ok(found)
}
