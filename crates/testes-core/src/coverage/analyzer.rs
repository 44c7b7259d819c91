//! Aggregation over a filterable set of files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::file::{File, FileSummary};
use super::line::{LineClassifier, PatternClassifier};
use super::{AnalysisResult, CoverageError, CoverageResult};

/// A set of [`File`]s keyed by canonical path, all bound to one
/// [`CoverageResult`].
pub struct Analyzer {
    result: CoverageResult,
    files: BTreeMap<PathBuf, File>,
    classifier: Box<dyn LineClassifier>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Analyzer {
    /// An empty analyzer using [`PatternClassifier::standard`].
    pub fn new(result: CoverageResult) -> Self {
        Analyzer {
            result,
            files: BTreeMap::new(),
            classifier: Box::new(PatternClassifier::standard()),
        }
    }

    /// Replace the line classifier. Files already added keep their
    /// classification.
    pub fn with_classifier(mut self, classifier: impl LineClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn result(&self) -> &CoverageResult {
        &self.result
    }

    // ========================================================================
    // File Set
    // ========================================================================

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> AnalysisResult<&mut Self> {
        let file = File::analyze(path.as_ref(), &self.result, self.classifier.as_ref())?;
        debug!(path = %file.path().display(), "coverage file added");
        self.files.insert(file.path().to_path_buf(), file);
        Ok(self)
    }

    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> AnalysisResult<&mut Self> {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.files.remove(&key).is_none() {
            return Err(CoverageError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %key.display(), "coverage file removed");
        Ok(self)
    }

    /// Add every regular file under `dir`, recursively.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> AnalysisResult<&mut Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CoverageError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        let mut added = 0usize;
        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            self.add_file(entry.path())?;
            added += 1;
        }
        debug!(dir = %dir.display(), added, "coverage directory added");
        Ok(self)
    }

    /// Drop every file under `dir`.
    pub fn remove_directory(&mut self, dir: impl AsRef<Path>) -> AnalysisResult<&mut Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CoverageError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        let root = dir.canonicalize()?;
        let before = self.files.len();
        self.files.retain(|path, _| !path.starts_with(&root));
        debug!(dir = %root.display(), removed = before - self.files.len(), "coverage directory removed");
        Ok(self)
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    /// Keep only files whose path matches `pattern`.
    pub fn is(&mut self, pattern: &str) -> AnalysisResult<&mut Self> {
        let re = compile(pattern)?;
        Ok(self.filter(|file| re.is_match(&file.path().to_string_lossy())))
    }

    /// Drop files whose path matches `pattern`.
    pub fn not(&mut self, pattern: &str) -> AnalysisResult<&mut Self> {
        let re = compile(pattern)?;
        Ok(self.filter(|file| !re.is_match(&file.path().to_string_lossy())))
    }

    /// Keep only files for which `keep` returns true.
    pub fn filter(&mut self, mut keep: impl FnMut(&File) -> bool) -> &mut Self {
        self.files.retain(|path, file| {
            let kept = keep(file);
            if !kept {
                trace!(path = %path.display(), "coverage file filtered out");
            }
            kept
        });
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub fn file(&self, path: &Path) -> Option<&File> {
        self.files.get(path)
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn tested_files(&self) -> impl Iterator<Item = &File> {
        self.files().filter(|file| file.is_tested())
    }

    pub fn untested_files(&self) -> impl Iterator<Item = &File> {
        self.files().filter(|file| file.is_untested())
    }

    pub fn dead_files(&self) -> impl Iterator<Item = &File> {
        self.files().filter(|file| file.is_dead())
    }

    pub fn tested_count(&self) -> usize {
        self.tested_files().count()
    }

    pub fn untested_count(&self) -> usize {
        self.untested_files().count()
    }

    pub fn dead_count(&self) -> usize {
        self.dead_files().count()
    }

    pub fn total_lines(&self) -> usize {
        self.files().map(File::total_count).sum()
    }

    pub fn executed_lines(&self) -> usize {
        self.files().map(File::tested_count).sum()
    }

    pub fn unexecuted_lines(&self) -> usize {
        self.files().map(File::untested_count).sum()
    }

    pub fn dead_lines(&self) -> usize {
        self.files().map(File::dead_count).sum()
    }

    pub fn ignored_lines(&self) -> usize {
        self.files().map(File::ignored_count).sum()
    }

    /// Mean of the per-file percentages, rounded to `precision` digits.
    ///
    /// Each file weighs the same whatever its size. An empty set is 0.
    pub fn percent_tested(&self, precision: u32) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.files().map(File::percent_tested).sum();
        round_to(sum / self.files.len() as f64, precision)
    }

    pub fn summaries(&self) -> Vec<FileSummary> {
        self.files().map(File::summary).collect()
    }
}

fn compile(pattern: &str) -> AnalysisResult<Regex> {
    Regex::new(pattern).map_err(|source| CoverageError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    (value * factor).round() / factor
}
