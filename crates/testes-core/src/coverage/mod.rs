//! Coverage: raw probe results, line classification and aggregation.
//!
//! A [`CoverageResult`] holds what a [`CoverageProbe`] recorded: for each file,
//! a status per line number (a positive execution count, [`UNEXECUTED`] or
//! [`DEAD`]). A [`File`] combines that data with the file's text, using a
//! [`LineClassifier`] to set aside lines that can never count (blank lines,
//! comments, declarations, lone punctuation). The [`Analyzer`] keeps a
//! filterable set of files and reports per-file and aggregate figures.

mod analyzer;
mod file;
mod line;
mod probe;
mod result;

pub use analyzer::Analyzer;
pub use file::{File, FileSummary};
pub use line::{Line, LineClassifier, LineStatus, PatternClassifier};
pub use probe::{CoverageProbe, RecordedProbe};
pub use result::{CoverageResult, DEAD, UNEXECUTED};

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from loading coverage data and analyzing files.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// A file to analyze does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The path exists but is not a regular file.
    #[error("not a file: {}", path.display())]
    NotAFile { path: PathBuf },

    /// The path is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A filter pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed coverage data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type AnalysisResult<T> = Result<T, CoverageError>;
