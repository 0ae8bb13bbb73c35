//! Selecting input files and naming the plots made from them.
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum FileSelectError {
    #[error("Invalid input pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Could not read a path matching the input pattern: {0}")]
    UnreadableEntry(String),
    #[error("Input pattern '{0}' must include the directory containing the files (e.g. 'wrf/wrfout*')")]
    NoParentDir(String),
    #[error("Path {} does not have a file name", .0.display())]
    NoFileName(PathBuf),
    #[error("Invalid file filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("Could not create output directory {}: {reason}", path.display())]
    CreateDir { path: PathBuf, reason: String },
}

/// Filter applied to the file name (last path component) of each file
/// matching the input pattern.
///
/// Parsed from strings of the form:
///
/// * `all` - accept every file,
/// * `prefix:<text>` - the name starts with `text`,
/// * `contains:<text>` - the name contains `text`,
/// * `glob:<pattern>` - the name matches a glob pattern. Note that `[...]` in a
///   glob is a character class, so `glob:[wrf]*` matches any name starting with
///   "w", "r" or "f". Use `prefix:wrf` to match names starting with "wrf".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileFilter {
    All,
    Prefix(String),
    Contains(String),
    Glob(glob::Pattern),
}

impl FileFilter {
    pub fn matches(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => return false,
        };

        match self {
            FileFilter::All => true,
            FileFilter::Prefix(p) => name.starts_with(p.as_str()),
            FileFilter::Contains(s) => name.contains(s.as_str()),
            FileFilter::Glob(pat) => pat.matches(&name),
        }
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::Prefix("wrf".to_string())
    }
}

impl Display for FileFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFilter::All => write!(f, "all"),
            FileFilter::Prefix(p) => write!(f, "prefix:{p}"),
            FileFilter::Contains(s) => write!(f, "contains:{s}"),
            FileFilter::Glob(pat) => write!(f, "glob:{}", pat.as_str()),
        }
    }
}

impl FromStr for FileFilter {
    type Err = FileSelectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| FileSelectError::InvalidFilter {
            filter: s.to_string(),
            reason: reason.to_string(),
        };

        if s == "all" {
            return Ok(Self::All);
        }

        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| err("expected 'all', 'prefix:<text>', 'contains:<text>' or 'glob:<pattern>'"))?;
        if value.is_empty() {
            return Err(err("the text after the colon must not be empty"));
        }

        match kind {
            "prefix" => Ok(Self::Prefix(value.to_string())),
            "contains" => Ok(Self::Contains(value.to_string())),
            "glob" => {
                let pat = glob::Pattern::new(value).map_err(|e| err(&e.to_string()))?;
                Ok(Self::Glob(pat))
            }
            _ => Err(err("the filter type must be 'prefix', 'contains' or 'glob'")),
        }
    }
}

impl TryFrom<String> for FileFilter {
    type Error = FileSelectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileFilter> for String {
    fn from(value: FileFilter) -> Self {
        value.to_string()
    }
}

/// All files (not directories) matching the glob `pattern`, in the order `glob` returns them.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, FileSelectError> {
    let matches = glob::glob(pattern).map_err(|e| FileSelectError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = vec![];
    for entry in matches {
        let entry = entry.map_err(|e| FileSelectError::UnreadableEntry(e.to_string()))?;
        if entry.is_dir() {
            log::debug!("Skipping directory {}", entry.display());
            continue;
        }
        files.push(entry);
    }
    Ok(files)
}

/// Name of the output directory for an input pattern: `prefix` followed by the
/// name of the directory the pattern searches in, e.g. "UpdatedPlots_run1" for
/// "/data/run1/wrfout*".
///
/// Everything after the last separator is the file part, even when it is
/// empty, so "data/run3/" names "run3". Both "/" and "\" count as separators,
/// so Windows-style patterns give the same result on any platform. A "." or
/// ".." directory is resolved against the current directory.
pub fn output_dir_name(pattern: &str, prefix: &str) -> Result<String, FileSelectError> {
    let is_sep = |c: char| c == '/' || c == '\\';
    let no_parent = || FileSelectError::NoParentDir(pattern.to_string());

    let (dir, _) = pattern.rsplit_once(is_sep).ok_or_else(no_parent)?;
    let subdir = dir.rsplit(is_sep).find(|c| !c.is_empty()).ok_or_else(no_parent)?;

    if subdir == "." || subdir == ".." {
        let resolved = std::fs::canonicalize(dir).map_err(|_| no_parent())?;
        let name = resolved.file_name().ok_or_else(no_parent)?;
        return Ok(format!("{prefix}{}", name.to_string_lossy()));
    }

    Ok(format!("{prefix}{subdir}"))
}

/// Output file name for `input`: its file name followed by `suffix`.
pub fn output_file_name(input: &Path, suffix: &str) -> Result<String, FileSelectError> {
    let name = input
        .file_name()
        .ok_or_else(|| FileSelectError::NoFileName(input.to_path_buf()))?;
    Ok(format!("{}{suffix}", name.to_string_lossy()))
}

/// Create `dir` (and any missing parents) if it does not exist.
pub fn ensure_output_dir(dir: &Path) -> Result<(), FileSelectError> {
    if dir.is_dir() {
        return Ok(());
    }
    log::info!("Creating output directory {}", dir.display());
    std::fs::create_dir_all(dir).map_err(|e| FileSelectError::CreateDir {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}
