//! The read-only contract shared by test units and suites, and run events.

use crate::assertion::{AssertionCollection, TestFailure};
use crate::benchmark::BenchmarkCollection;
use crate::fixture::HookPolicy;
use crate::suite::Suite;

// ============================================================================
// Runnable
// ============================================================================

/// Anything that can be run and reported on: a test unit or a suite.
pub trait Runnable {
    /// Display name. Units default to their concrete type name.
    fn name(&self) -> &str;

    /// Package (namespace) the runnable was discovered under, if any.
    fn package(&self) -> Option<&str> {
        None
    }

    /// Run, reporting progress to `listener`.
    fn run_with(&mut self, listener: &mut dyn RunListener);

    fn run(&mut self) {
        self.run_with(&mut NoopListener);
    }

    /// Policy applied to fixture hook failures on the next run.
    fn set_hook_policy(&mut self, policy: HookPolicy);

    /// Every assertion made, in execution order.
    fn assertions(&self) -> AssertionCollection;

    /// Every failure recorded, in execution order.
    fn exceptions(&self) -> Vec<TestFailure>;

    fn benchmarks(&self) -> BenchmarkCollection;

    /// Number of test methods.
    fn count(&self) -> usize;

    /// True when every assertion passed and no failure was recorded.
    fn is_passed(&self) -> bool {
        self.assertions().is_passed() && self.exceptions().is_empty()
    }

    fn is_failed(&self) -> bool {
        !self.is_passed()
    }

    fn as_suite(&self) -> Option<&Suite> {
        None
    }
}

// ============================================================================
// Run Events
// ============================================================================

/// Observer of a run. Every hook defaults to a no-op.
pub trait RunListener {
    fn pre_run(&mut self, _runnable: &dyn Runnable) {}

    fn pre_method(&mut self, _unit: &str, _method: &str) {}

    fn post_method(&mut self, _unit: &str, _method: &str, _passed: bool) {}

    fn post_run(&mut self, _runnable: &dyn Runnable) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl RunListener for NoopListener {}

/// Listener calling a closure once for each finished test unit.
pub struct OnComplete<F> {
    callback: F,
}

impl<F: FnMut(&dyn Runnable)> RunListener for OnComplete<F> {
    fn post_run(&mut self, runnable: &dyn Runnable) {
        if runnable.as_suite().is_none() {
            (self.callback)(runnable);
        }
    }
}

/// Adapt a completion callback into a listener.
pub fn on_complete<F: FnMut(&dyn Runnable)>(callback: F) -> OnComplete<F> {
    OnComplete { callback }
}
