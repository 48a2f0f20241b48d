//! Source discovery and batch grouping.
//!
//! Files are grouped by the date in their name into (year, month, decade)
//! batches, decade 0 holding days 1-9, decade 1 days 10-19 and decade 2
//! days 20-31. Batches sort chronologically.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::parser::timestamp_from_file_name;

/// Chronological batch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchKey {
    pub year: i32,
    pub month: u32,
    pub decade: u8,
}

impl BatchKey {
    /// Returns the batch a calendar day belongs to.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let decade = match date.day() {
            1..=9 => 0,
            10..=19 => 1,
            _ => 2,
        };
        Self {
            year: date.year(),
            month: date.month(),
            decade,
        }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}/{}", self.year, self.month, self.decade)
    }
}

/// One raw quote file with the timestamp encoded in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Identifier recorded once the file is ingested
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl SourceFile {
    /// Builds a source file from its path, or `None` if the name has no date.
    #[must_use]
    pub fn from_path(path: PathBuf, root: &Path) -> Option<Self> {
        let timestamp = timestamp_from_file_name(&path)?;
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        Some(Self {
            path,
            name,
            timestamp,
        })
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A group of files processed together.
///
/// A batch is always processed whole: files an earlier run already ingested
/// are read again so day and hourly rows are rebuilt from every file of the
/// period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub key: BatchKey,
    /// Files ordered by timestamp, then by name
    pub files: Vec<SourceFile>,
    /// Names of the files an earlier run already ingested
    pub done: BTreeSet<String>,
}

impl Batch {
    /// Names of the batch's files.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    /// Records which of the batch's files appear in `processed`.
    pub fn mark_done(&mut self, processed: &HashSet<String>) {
        self.done = self
            .files
            .iter()
            .filter(|f| processed.contains(&f.name))
            .map(|f| f.name.clone())
            .collect();
    }

    #[must_use]
    pub fn is_done(&self, file: &SourceFile) -> bool {
        self.done.contains(&file.name)
    }

    /// Files not ingested yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.files.len() - self.done.len()
    }
}

/// Walks `root` recursively and returns every dated file, sorted by path.
///
/// Files whose name carries no date are logged and skipped.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn discover_files(root: &Path) -> Result<Vec<SourceFile>> {
    let mut paths = Vec::new();
    collect_paths(root, &mut paths)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match SourceFile::from_path(path.clone(), root) {
            Some(file) => files.push(file),
            None => warn!(file = %path.display(), "No date in file name, skipping"),
        }
    }

    debug!(root = %root.display(), files = files.len(), "Discovered source files");
    Ok(files)
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        if file_type.is_dir() {
            collect_paths(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Groups files into batches, earliest first.
#[must_use]
pub fn group_into_batches(files: Vec<SourceFile>) -> Vec<Batch> {
    let mut groups: BTreeMap<BatchKey, Vec<SourceFile>> = BTreeMap::new();
    for file in files {
        groups
            .entry(BatchKey::for_date(file.date()))
            .or_default()
            .push(file);
    }

    groups
        .into_iter()
        .map(|(key, mut files)| {
            files.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
            Batch {
                key,
                files,
                done: BTreeSet::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn source(name: &str) -> SourceFile {
        SourceFile::from_path(PathBuf::from(name), Path::new("")).unwrap()
    }

    // ============================================
    // Batch Key Tests
    // ============================================

    #[test]
    fn test_decade_boundaries() {
        assert_eq!(BatchKey::for_date(date(2020, 1, 1)).decade, 0);
        assert_eq!(BatchKey::for_date(date(2020, 1, 9)).decade, 0);
        assert_eq!(BatchKey::for_date(date(2020, 1, 10)).decade, 1);
        assert_eq!(BatchKey::for_date(date(2020, 1, 19)).decade, 1);
        assert_eq!(BatchKey::for_date(date(2020, 1, 20)).decade, 2);
        assert_eq!(BatchKey::for_date(date(2020, 1, 31)).decade, 2);
    }

    #[test]
    fn test_keys_order_chronologically() {
        let a = BatchKey::for_date(date(2019, 12, 25));
        let b = BatchKey::for_date(date(2020, 1, 5));
        let c = BatchKey::for_date(date(2020, 1, 15));
        let d = BatchKey::for_date(date(2020, 2, 1));

        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn test_key_display() {
        let key = BatchKey::for_date(date(2021, 3, 14));
        assert_eq!(key.to_string(), "2021-03/1");
    }

    // ============================================
    // Grouping Tests
    // ============================================

    #[test]
    fn test_group_into_batches_orders_batches_and_files() {
        let files = vec![
            source("paris 2020-01-12 09:00:00.csv"),
            source("paris 2020-01-02 10:00:00.csv"),
            source("amsterdam 2020-01-02 09:00:00.csv"),
            source("paris 2019-12-31 17:00:00.csv"),
        ];

        let batches = group_into_batches(files);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].key.to_string(), "2019-12/2");
        assert_eq!(batches[1].key.to_string(), "2020-01/0");
        assert_eq!(batches[2].key.to_string(), "2020-01/1");
        assert_eq!(
            batches[1].file_names(),
            vec![
                "amsterdam 2020-01-02 09:00:00.csv".to_string(),
                "paris 2020-01-02 10:00:00.csv".to_string(),
            ]
        );
    }

    #[test]
    fn test_mark_done_counts_pending() {
        let mut batches = group_into_batches(vec![
            source("paris 2020-01-02 09:00:00.csv"),
            source("paris 2020-01-02 10:00:00.csv"),
        ]);
        let processed: HashSet<String> = ["paris 2020-01-02 09:00:00.csv".to_string(), "other.csv".to_string()]
            .into_iter()
            .collect();

        batches[0].mark_done(&processed);

        assert_eq!(batches[0].done.len(), 1);
        assert_eq!(batches[0].pending_count(), 1);
        assert!(batches[0].is_done(&batches[0].files[0]));
        assert!(!batches[0].is_done(&batches[0].files[1]));
    }

    #[test]
    fn test_group_empty() {
        assert!(group_into_batches(Vec::new()).is_empty());
    }

    // ============================================
    // Discovery Tests
    // ============================================

    #[test]
    fn test_discover_files_recursive_and_skips_undated() {
        let dir = tempfile::tempdir().unwrap();
        let year = dir.path().join("2020");
        fs::create_dir(&year).unwrap();
        File::create(year.join("paris 2020-01-02 09:00:00.csv")).unwrap();
        File::create(year.join("amsterdam 2020-01-02 09:00:00.csv")).unwrap();
        File::create(dir.path().join("README.txt")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let expected: Vec<String> = ["amsterdam 2020-01-02 09:00:00.csv", "paris 2020-01-02 09:00:00.csv"]
            .iter()
            .map(|n| Path::new("2020").join(n).to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_discover_missing_directory_is_error() {
        assert!(discover_files(Path::new("/nonexistent/bourse")).is_err());
    }
}
