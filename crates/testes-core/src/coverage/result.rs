//! Raw per-file, per-line execution data.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::AnalysisResult;

/// Line status: the line was never executed.
pub const UNEXECUTED: i64 = -1;
/// Line status: the probe found the line unreachable.
pub const DEAD: i64 = -2;

/// Execution status per line, per file.
///
/// A positive status is an execution count. Serialized as the probe's raw
/// format: `{"/abs/path.rs": {"12": 3, "13": -1}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageResult {
    files: BTreeMap<PathBuf, BTreeMap<u32, i64>>,
}

impl CoverageResult {
    pub fn new() -> Self {
        CoverageResult::default()
    }

    pub fn from_map(files: BTreeMap<PathBuf, BTreeMap<u32, i64>>) -> Self {
        CoverageResult { files }
    }

    pub fn from_json(json: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> AnalysisResult<Self> {
        let json = fs::read_to_string(path)?;
        CoverageResult::from_json(&json)
    }

    pub fn to_json(&self) -> AnalysisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Line statuses recorded for a file.
    pub fn file(&self, path: &Path) -> Option<&BTreeMap<u32, i64>> {
        self.files.get(path)
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Status of one line; 0 when nothing was recorded for it.
    pub fn line(&self, path: &Path, number: u32) -> i64 {
        self.file(path)
            .and_then(|lines| lines.get(&number))
            .copied()
            .unwrap_or(0)
    }

    pub fn record(&mut self, path: impl Into<PathBuf>, number: u32, status: i64) -> &mut Self {
        self.files
            .entry(path.into())
            .or_default()
            .insert(number, status);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_line_is_zero() {
        let mut result = CoverageResult::new();
        result.record("/src/a.rs", 3, 2);
        assert_eq!(result.line(Path::new("/src/a.rs"), 3), 2);
        assert_eq!(result.line(Path::new("/src/a.rs"), 4), 0);
        assert_eq!(result.line(Path::new("/src/b.rs"), 1), 0);
        assert!(result.file(Path::new("/src/b.rs")).is_none());
    }

    #[test]
    fn test_parses_probe_output() {
        let json = r#"{"/src/a.rs": {"1": 5, "2": -1, "3": -2}}"#;
        let result = CoverageResult::from_json(json).unwrap();
        let path = Path::new("/src/a.rs");
        assert_eq!(result.line(path, 1), 5);
        assert_eq!(result.line(path, 2), UNEXECUTED);
        assert_eq!(result.line(path, 3), DEAD);
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = CoverageResult::from_json("{not json").unwrap_err();
        assert!(matches!(err, super::super::CoverageError::Json(_)));
    }
}
