//! A source file partitioned into classified lines.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::line::{Line, LineClassifier};
use super::{AnalysisResult, CoverageError, CoverageResult};

/// A source file bound to coverage data.
///
/// Lines are classified once, at construction.
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
    lines: Vec<Line>,
}

/// Serializable per-file figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub total: usize,
    pub tested: usize,
    pub untested: usize,
    pub dead: usize,
    pub ignored: usize,
    pub percent_tested: f64,
}

impl File {
    /// Read `path` and classify its lines against `result`.
    ///
    /// Statuses are looked up under the canonical path first, then under
    /// `path` as given.
    pub fn analyze(
        path: &Path,
        result: &CoverageResult,
        classifier: &dyn LineClassifier,
    ) -> AnalysisResult<Self> {
        if !path.exists() {
            return Err(CoverageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(CoverageError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let canonical = path.canonicalize()?;
        let bytes = fs::read(&canonical)?;
        let source = String::from_utf8_lossy(&bytes);

        let lookup = if result.has_file(&canonical) {
            canonical.as_path()
        } else {
            path
        };
        let lines = source
            .lines()
            .enumerate()
            .map(|(idx, text)| {
                let number = idx as u32 + 1;
                Line::new(number, text, result.line(lookup, number), classifier)
            })
            .collect();

        Ok(File {
            path: canonical,
            lines,
        })
    }

    /// Classify in-memory source text as if it lived at `path`.
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: &str,
        result: &CoverageResult,
        classifier: &dyn LineClassifier,
    ) -> Self {
        let path = path.into();
        let lines = source
            .lines()
            .enumerate()
            .map(|(idx, text)| {
                let number = idx as u32 + 1;
                Line::new(number, text, result.line(&path, number), classifier)
            })
            .collect();
        File { path, lines }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, number: u32) -> Option<&Line> {
        let idx = usize::try_from(number).ok()?.checked_sub(1)?;
        self.lines.get(idx)
    }

    pub fn tested_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|line| line.is_tested())
    }

    pub fn untested_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|line| line.is_untested())
    }

    pub fn dead_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|line| line.is_dead())
    }

    pub fn ignored_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|line| line.is_ignored())
    }

    pub fn total_count(&self) -> usize {
        self.lines.len()
    }

    pub fn tested_count(&self) -> usize {
        self.tested_lines().count()
    }

    pub fn untested_count(&self) -> usize {
        self.untested_lines().count()
    }

    pub fn dead_count(&self) -> usize {
        self.dead_lines().count()
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored_lines().count()
    }

    /// Tested share of countable lines, 0 to 100, unrounded.
    ///
    /// A file with no untested lines is 100; otherwise a file with no
    /// tested lines is 0. Dead and ignored lines never count.
    pub fn percent_tested(&self) -> f64 {
        let tested = self.tested_count();
        let untested = self.untested_count();
        if untested == 0 {
            100.0
        } else if tested == 0 {
            0.0
        } else {
            tested as f64 / (tested + untested) as f64 * 100.0
        }
    }

    /// No untested lines. Agrees with `percent_tested() == 100.0`.
    pub fn is_tested(&self) -> bool {
        self.untested_count() == 0
    }

    pub fn is_untested(&self) -> bool {
        self.untested_count() > 0
    }

    /// Every line is dead.
    pub fn is_dead(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(Line::is_dead)
    }

    /// Every line is ignorable.
    pub fn is_ignored(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(Line::is_ignored)
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            path: self.path.clone(),
            total: self.total_count(),
            tested: self.tested_count(),
            untested: self.untested_count(),
            dead: self.dead_count(),
            ignored: self.ignored_count(),
            percent_tested: self.percent_tested(),
        }
    }
}
