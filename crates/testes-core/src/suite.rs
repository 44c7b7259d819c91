//! Suites: composable trees of test units and nested suites.

use std::fmt;

use tracing::info;

use crate::assertion::{AssertionCollection, TestFailure};
use crate::benchmark::BenchmarkCollection;
use crate::fixture::HookPolicy;
use crate::runnable::{RunListener, Runnable};

type Hook = Box<dyn FnMut()>;

/// A named collection of runnables.
pub struct Suite {
    name: String,
    package: Option<String>,
    tests: Vec<Box<dyn Runnable>>,
    set_up: Option<Hook>,
    tear_down: Option<Hook>,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("children", &self.tests.len())
            .finish()
    }
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Suite {
            name: name.into(),
            package: None,
            tests: Vec::new(),
            set_up: None,
            tear_down: None,
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Run `hook` before the children.
    pub fn on_set_up(mut self, hook: impl FnMut() + 'static) -> Self {
        self.set_up = Some(Box::new(hook));
        self
    }

    /// Run `hook` after the children.
    pub fn on_tear_down(mut self, hook: impl FnMut() + 'static) -> Self {
        self.tear_down = Some(Box::new(hook));
        self
    }

    /// Append a unit or a nested suite.
    pub fn add_test(&mut self, test: impl Runnable + 'static) -> &mut Self {
        self.tests.push(Box::new(test));
        self
    }

    pub fn add_boxed(&mut self, test: Box<dyn Runnable>) -> &mut Self {
        self.tests.push(test);
        self
    }

    pub fn add_tests<I>(&mut self, tests: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn Runnable>>,
    {
        self.tests.extend(tests);
        self
    }

    /// Direct children, suites included.
    pub fn children(&self) -> &[Box<dyn Runnable>] {
        &self.tests
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Every leaf unit, depth first, with nested suites flattened away.
    pub fn tests(&self) -> Vec<&dyn Runnable> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a dyn Runnable>) {
        for test in &self.tests {
            match test.as_suite() {
                Some(suite) => suite.collect_leaves(leaves),
                None => leaves.push(test.as_ref()),
            }
        }
    }

    /// Every nested suite, depth first, not including this one.
    pub fn suites(&self) -> Vec<&Suite> {
        let mut suites = Vec::new();
        for test in &self.tests {
            if let Some(suite) = test.as_suite() {
                suites.push(suite);
                suites.extend(suite.suites());
            }
        }
        suites
    }
}

impl Runnable for Suite {
    fn name(&self) -> &str {
        &self.name
    }

    fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    fn run_with(&mut self, listener: &mut dyn RunListener) {
        info!(suite = %self.name, tests = self.count(), "running suite");
        listener.pre_run(self);
        if let Some(hook) = self.set_up.as_mut() {
            hook();
        }
        for test in &mut self.tests {
            test.run_with(listener);
        }
        if let Some(hook) = self.tear_down.as_mut() {
            hook();
        }
        listener.post_run(self);
    }

    fn set_hook_policy(&mut self, policy: HookPolicy) {
        for test in &mut self.tests {
            test.set_hook_policy(policy);
        }
    }

    fn assertions(&self) -> AssertionCollection {
        self.tests.iter().flat_map(|test| test.assertions()).collect()
    }

    fn exceptions(&self) -> Vec<TestFailure> {
        self.tests.iter().flat_map(|test| test.exceptions()).collect()
    }

    /// Leaf benchmarks in child order, renamed `unit::method`. Same-named units keep
    /// their own entries.
    fn benchmarks(&self) -> BenchmarkCollection {
        let mut collection = BenchmarkCollection::new();
        for leaf in self.tests() {
            for entry in leaf.benchmarks() {
                collection.push(format!("{}::{}", leaf.name(), entry.name), entry.benchmark);
            }
        }
        collection
    }

    fn count(&self) -> usize {
        self.tests.iter().map(|test| test.count()).sum()
    }

    fn is_passed(&self) -> bool {
        self.tests.iter().all(|test| test.is_passed())
    }

    fn as_suite(&self) -> Option<&Suite> {
        Some(self)
    }
}
