//! The seam to whatever records line execution.

use tracing::debug;

use super::{AnalysisResult, CoverageResult};

/// Records which lines execute between `start` and `stop`.
pub trait CoverageProbe {
    fn start(&mut self) -> AnalysisResult<()>;

    /// Stop recording and return what was recorded.
    fn stop(&mut self) -> AnalysisResult<CoverageResult>;

    fn is_running(&self) -> bool;
}

/// A probe that replays a result recorded elsewhere, for example the JSON
/// output of an instrumented build.
#[derive(Debug, Clone, Default)]
pub struct RecordedProbe {
    recorded: CoverageResult,
    running: bool,
}

impl RecordedProbe {
    pub fn new(recorded: CoverageResult) -> Self {
        RecordedProbe {
            recorded,
            running: false,
        }
    }

    pub fn from_json(json: &str) -> AnalysisResult<Self> {
        Ok(RecordedProbe::new(CoverageResult::from_json(json)?))
    }
}

impl CoverageProbe for RecordedProbe {
    fn start(&mut self) -> AnalysisResult<()> {
        debug!(files = self.recorded.len(), "coverage probe started");
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> AnalysisResult<CoverageResult> {
        self.running = false;
        Ok(self.recorded.clone())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_recorded_probe_replays() {
        let mut probe = RecordedProbe::from_json(r#"{"/a.rs": {"1": 1}}"#).unwrap();
        probe.start().unwrap();
        assert!(probe.is_running());
        let result = probe.stop().unwrap();
        assert!(!probe.is_running());
        assert_eq!(result.line(Path::new("/a.rs"), 1), 1);
    }
}
