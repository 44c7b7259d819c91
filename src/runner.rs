//! Run driver: applies configuration, times the run and summarizes it.

use std::time::SystemTime;

use serde::Serialize;
use tracing::{info, warn};

use crate::assertion::{Assertion, TestFailure};
use crate::benchmark::{Benchmark, BenchmarkSummary, MemoryProbe, ProcessMemory};
use crate::config::RunConfig;
use crate::coverage::{Analyzer, AnalysisResult, CoverageProbe, FileSummary};
use crate::error::{ErrorCode, TestesResult};
use crate::runnable::{RunListener, Runnable};
use crate::suite::Suite;

// ============================================================================
// Run Report
// ============================================================================

/// Coverage figures attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Mean of per-file percentages, rounded to the configured precision.
    pub percent_tested: f64,
    pub files: Vec<FileSummary>,
}

/// Outcome of one run, ready for a renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub suite: String,
    pub started_at: String,
    pub finished_at: String,
    pub benchmark: BenchmarkSummary,
    /// Leaf units run.
    pub units: usize,
    /// Test methods run.
    pub tests: usize,
    pub assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: Vec<Assertion>,
    pub failures: Vec<TestFailure>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
}

impl RunReport {
    pub fn coverage_percent(&self) -> Option<f64> {
        self.coverage.as_ref().map(|c| c.percent_tested)
    }

    /// Process exit code: 0 when passed, otherwise [`ErrorCode::TestsFailed`].
    pub fn exit_code(&self) -> u8 {
        if self.passed {
            0
        } else {
            ErrorCode::TestsFailed.code()
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Runs suites under a [`RunConfig`].
pub struct Runner {
    config: RunConfig,
    memory: Box<dyn MemoryProbe>,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Runner {
            config,
            memory: Box::new(ProcessMemory::new()),
        }
    }

    pub fn with_memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.memory = Box::new(probe);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `suite` to completion and summarize it.
    pub fn run(&mut self, suite: &mut Suite, listener: &mut dyn RunListener) -> RunReport {
        suite.set_hook_policy(self.config.hook_policy.value);

        let started_at = SystemTime::now();
        let mut benchmark = Benchmark::new();
        benchmark.start(self.memory.as_mut());
        suite.run_with(listener);
        benchmark.stop(self.memory.as_mut());
        let finished_at = SystemTime::now();

        let assertions = suite.assertions();
        let failures = suite.exceptions();
        let report = RunReport {
            suite: suite.name().to_string(),
            started_at: format_timestamp(started_at),
            finished_at: format_timestamp(finished_at),
            benchmark: benchmark.summary(),
            units: suite.tests().len(),
            tests: suite.count(),
            assertions: assertions.len(),
            passed_assertions: assertions.passed().len(),
            failed_assertions: assertions.failed().into_iter().cloned().collect(),
            passed: assertions.is_passed() && failures.is_empty(),
            failures,
            coverage: None,
        };

        if report.passed {
            info!(suite = %report.suite, tests = report.tests, "run passed");
        } else {
            warn!(
                suite = %report.suite,
                failed_assertions = report.failed_assertions.len(),
                failures = report.failures.len(),
                "run failed"
            );
        }
        report
    }

    /// Run `suite` with `probe` recording, then hand the recorded result to
    /// `select` to pick the files that count.
    pub fn run_with_coverage<S>(
        &mut self,
        suite: &mut Suite,
        listener: &mut dyn RunListener,
        probe: &mut dyn CoverageProbe,
        select: S,
    ) -> TestesResult<RunReport>
    where
        S: FnOnce(&mut Analyzer) -> AnalysisResult<()>,
    {
        probe.start()?;
        let mut report = self.run(suite, listener);
        let result = probe.stop()?;

        let mut analyzer = Analyzer::new(result);
        select(&mut analyzer)?;
        report.coverage = Some(CoverageReport {
            percent_tested: analyzer.percent_tested(self.config.coverage_precision.value),
            files: analyzer.summaries(),
        });
        Ok(report)
    }
}

/// Format a timestamp for JSON output (ISO 8601).
fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
