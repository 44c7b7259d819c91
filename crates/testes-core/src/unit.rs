//! Test units: one test case, its methods and everything they record.
//!
//! A test case is a plain struct implementing [`TestCase`]. It registers its
//! test methods explicitly in a [`MethodTable`]; methods run in registration
//! order. Each method receives the [`UnitContext`], which records assertions,
//! holds the unit's fixtures and tracks opt-in benchmarks.
//!
//! ## Run Order
//!
//! 1. `set_up` (methods are skipped when it fails)
//! 2. fixture install
//! 3. every test method, each isolated: an error or panic is recorded as a
//!    [`TestFailure`] and the next method still runs
//! 4. fixture uninstall
//! 5. `tear_down`

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe, Location};

use tracing::{debug, info, warn};

use crate::assertion::{
    Assertion, AssertionCollection, AssertionLocation, FailureKind, FatalAssertion, TestFailure,
    DEFAULT_CODE,
};
use crate::benchmark::{Benchmark, BenchmarkCollection, MemoryProbe, ProcessMemory};
use crate::fixture::{Fixture, FixtureError, FixtureManager, FixtureResult, HookFailure, HookPolicy};
use crate::names::short_type_name;
use crate::runnable::{RunListener, Runnable};

/// A test method: receives the case and the unit context.
pub type TestMethod<T> = fn(&mut T, &mut UnitContext) -> anyhow::Result<()>;

// ============================================================================
// Method Table
// ============================================================================

struct MethodEntry<T> {
    name: String,
    method: TestMethod<T>,
    file: &'static str,
    line: u32,
}

/// Ordered, duplicate-free list of a case's test methods.
pub struct MethodTable<T> {
    entries: Vec<MethodEntry<T>>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        MethodTable {
            entries: Vec::new(),
        }
    }
}

impl<T> MethodTable<T> {
    pub fn new() -> Self {
        MethodTable::default()
    }

    /// Register a test method. A second method with the same name is ignored.
    #[track_caller]
    pub fn add(&mut self, name: impl Into<String>, method: TestMethod<T>) -> &mut Self {
        let name = name.into();
        if self.contains(&name) {
            warn!(method = %name, "duplicate test method ignored");
            return self;
        }
        let caller = Location::caller();
        self.entries.push(MethodEntry {
            name,
            method,
            file: caller.file(),
            line: caller.line(),
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Test Case
// ============================================================================

/// A test case type.
pub trait TestCase: Sized + 'static {
    /// Register the case's test methods, in the order they should run.
    fn methods(table: &mut MethodTable<Self>);

    /// Runs before fixtures are installed. Register fixtures here.
    fn set_up(&mut self, _ctx: &mut UnitContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after fixtures are uninstalled.
    fn tear_down(&mut self, _ctx: &mut UnitContext) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Unit Context
// ============================================================================

/// Everything a running unit records, handed to each test method.
pub struct UnitContext {
    class: String,
    method: String,
    assertions: AssertionCollection,
    exceptions: Vec<TestFailure>,
    benchmarks: BenchmarkCollection,
    fixtures: FixtureManager,
    memory: Box<dyn MemoryProbe>,
}

impl UnitContext {
    pub fn new(class: impl Into<String>) -> Self {
        UnitContext {
            class: class.into(),
            method: String::new(),
            assertions: AssertionCollection::new(),
            exceptions: Vec::new(),
            benchmarks: BenchmarkCollection::new(),
            fixtures: FixtureManager::new(),
            memory: Box::new(ProcessMemory::new()),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Method (or lifecycle phase) currently running.
    pub fn current_method(&self) -> &str {
        &self.method
    }

    /// Record an assertion with the default code.
    #[track_caller]
    pub fn assert(&mut self, expression: bool, message: impl Into<String>) -> &mut Self {
        let location = AssertionLocation::caller(&self.class, &self.method);
        self.record(Assertion::new(expression, message, DEFAULT_CODE, location))
    }

    #[track_caller]
    pub fn assert_with_code(
        &mut self,
        expression: bool,
        message: impl Into<String>,
        code: i32,
    ) -> &mut Self {
        let location = AssertionLocation::caller(&self.class, &self.method);
        self.record(Assertion::new(expression, message, code, location))
    }

    /// Record an assertion and stop the method when it fails.
    ///
    /// ```ignore
    /// ctx.assert_fatal(user.is_some(), "user exists")?;
    /// ```
    #[track_caller]
    pub fn assert_fatal(
        &mut self,
        expression: bool,
        message: impl Into<String>,
    ) -> Result<(), FatalAssertion> {
        let message = message.into();
        let location = AssertionLocation::caller(&self.class, &self.method);
        self.record(Assertion::new(expression, message.clone(), DEFAULT_CODE, location));
        if expression {
            Ok(())
        } else {
            Err(FatalAssertion {
                message,
                code: DEFAULT_CODE,
            })
        }
    }

    fn record(&mut self, assertion: Assertion) -> &mut Self {
        self.assertions.add(assertion);
        self
    }

    /// Time the named method when it runs.
    pub fn benchmark(&mut self, method: impl Into<String>) -> &mut Self {
        self.benchmarks.add(method, Benchmark::new());
        self
    }

    pub fn set_memory_probe(&mut self, probe: Box<dyn MemoryProbe>) -> &mut Self {
        self.memory = probe;
        self
    }

    /// Register a fixture for this unit.
    pub fn set_fixture<F: Fixture>(
        &mut self,
        name: impl Into<String>,
        fixture: F,
    ) -> FixtureResult<&mut Self> {
        self.fixtures.set(name, fixture)?;
        Ok(self)
    }

    pub fn fixture<F: Fixture>(&self, name: &str) -> FixtureResult<&F> {
        self.fixtures.get_as::<F>(name)
    }

    pub fn fixture_mut<F: Fixture>(&mut self, name: &str) -> FixtureResult<&mut F> {
        self.fixtures.get_mut_as::<F>(name)
    }

    pub fn has_fixture(&self, name: &str) -> bool {
        self.fixtures.has(name)
    }

    pub fn fixtures(&self) -> &FixtureManager {
        &self.fixtures
    }

    pub fn fixtures_mut(&mut self) -> &mut FixtureManager {
        &mut self.fixtures
    }

    pub fn assertions(&self) -> &AssertionCollection {
        &self.assertions
    }

    pub fn exceptions(&self) -> &[TestFailure] {
        &self.exceptions
    }

    pub fn benchmarks(&self) -> &BenchmarkCollection {
        &self.benchmarks
    }

    fn start_benchmark(&mut self, method: &str) {
        if let Ok(bench) = self.benchmarks.get_mut(method) {
            bench.start(self.memory.as_mut());
        }
    }

    fn stop_benchmark(&mut self, method: &str) {
        if let Ok(bench) = self.benchmarks.get_mut(method) {
            bench.stop(self.memory.as_mut());
        }
    }

    fn fail(&mut self, failure: TestFailure) {
        warn!(
            unit = %failure.test_class(),
            method = %failure.test_method(),
            kind = %failure.kind(),
            message = %failure.message(),
            "test failure recorded"
        );
        self.exceptions.push(failure);
    }
}

// ============================================================================
// Test Unit
// ============================================================================

/// A runnable test case.
pub struct TestUnit<T: TestCase> {
    case: T,
    name: String,
    package: Option<String>,
    methods: MethodTable<T>,
    context: UnitContext,
    file: &'static str,
    line: u32,
}

impl<T: TestCase + Default> Default for TestUnit<T> {
    #[track_caller]
    fn default() -> Self {
        TestUnit::new(T::default())
    }
}

impl<T: TestCase> TestUnit<T> {
    /// Wrap a case. The unit is named after the case's type.
    #[track_caller]
    pub fn new(case: T) -> Self {
        let mut methods = MethodTable::new();
        T::methods(&mut methods);
        let name = short_type_name(std::any::type_name::<T>()).to_string();
        let caller = Location::caller();
        TestUnit {
            case,
            context: UnitContext::new(name.clone()),
            name,
            package: None,
            methods,
            file: caller.file(),
            line: caller.line(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.context.class = self.name.clone();
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.context.set_memory_probe(Box::new(probe));
        self
    }

    pub fn with_hook_policy(mut self, policy: HookPolicy) -> Self {
        self.context.fixtures.set_policy(policy);
        self
    }

    pub fn case(&self) -> &T {
        &self.case
    }

    pub fn case_mut(&mut self) -> &mut T {
        &mut self.case
    }

    pub fn context(&self) -> &UnitContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut UnitContext {
        &mut self.context
    }

    pub fn fixtures(&self) -> &FixtureManager {
        &self.context.fixtures
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.names()
    }

    /// Assertions made by one method.
    pub fn method_assertions(&self, method: &str) -> AssertionCollection {
        self.context
            .assertions
            .iter()
            .filter(|a| a.test_method() == method)
            .cloned()
            .collect()
    }

    /// Failures recorded while one method ran.
    pub fn method_exceptions(&self, method: &str) -> Vec<&TestFailure> {
        self.context
            .exceptions
            .iter()
            .filter(|f| f.test_method() == method)
            .collect()
    }

    pub fn is_method_passed(&self, method: &str) -> bool {
        let assertions_passed = self
            .context
            .assertions
            .iter()
            .filter(|a| a.test_method() == method)
            .all(Assertion::is_passed);
        assertions_passed && self.method_exceptions(method).is_empty()
    }

    fn location(&self, method: &str) -> AssertionLocation {
        AssertionLocation::new(self.file, self.line, &self.name, method)
    }

    fn set_up(&mut self) -> bool {
        self.context.method = "set_up".to_string();
        let case = &mut self.case;
        let ctx = &mut self.context;
        match trap(|| case.set_up(ctx)) {
            Ok(()) => true,
            Err(trapped) => {
                let failure = trapped.into_failure(FailureKind::SetUp, self.location("set_up"));
                self.context.fail(failure);
                false
            }
        }
    }

    fn tear_down(&mut self) {
        self.context.method = "tear_down".to_string();
        let case = &mut self.case;
        let ctx = &mut self.context;
        if let Err(trapped) = trap(|| case.tear_down(ctx)) {
            let failure = trapped.into_failure(FailureKind::TearDown, self.location("tear_down"));
            self.context.fail(failure);
        }
    }

    fn install(&mut self) -> bool {
        self.context.method = "install".to_string();
        let outcome = self.context.fixtures.install();
        self.drain_hook_failures();
        match outcome {
            Ok(()) => true,
            Err(err) => {
                self.fixture_failure(&err, "install");
                false
            }
        }
    }

    fn uninstall(&mut self) {
        self.context.method = "uninstall".to_string();
        let outcome = self.context.fixtures.uninstall();
        self.drain_hook_failures();
        if let Err(err) = outcome {
            self.fixture_failure(&err, "uninstall");
        }
    }

    fn fixture_failure(&mut self, err: &FixtureError, phase: &str) {
        let failure = TestFailure::new(FailureKind::FixtureHook, err.to_string(), self.location(phase));
        self.context.fail(failure);
    }

    /// Move lenient-mode hook failures into the unit's failures.
    fn drain_hook_failures(&mut self) {
        let failures: Vec<HookFailure> = self.context.fixtures.take_errors();
        for hook_failure in failures {
            let location = self.location(&hook_failure.key());
            let failure = TestFailure::new(
                FailureKind::FixtureHook,
                FixtureError::from(hook_failure).to_string(),
                location,
            );
            self.context.fail(failure);
        }
    }

    fn run_method(&mut self, idx: usize, listener: &mut dyn RunListener) {
        let (name, method, file, line) = {
            let entry = &self.methods.entries[idx];
            (entry.name.clone(), entry.method, entry.file, entry.line)
        };
        self.context.method = name.clone();
        listener.pre_method(&self.name, &name);
        debug!(unit = %self.name, method = %name, "running test method");

        self.context.start_benchmark(&name);
        let case = &mut self.case;
        let ctx = &mut self.context;
        let outcome = trap(|| method(case, ctx));
        self.context.stop_benchmark(&name);

        if let Err(trapped) = outcome {
            let location = AssertionLocation::new(file, line, &self.name, &name);
            let failure = trapped.into_failure(FailureKind::Error, location);
            self.context.fail(failure);
        }

        let passed = self.is_method_passed(&name);
        listener.post_method(&self.name, &name, passed);
    }
}

impl<T: TestCase> Runnable for TestUnit<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    fn run_with(&mut self, listener: &mut dyn RunListener) {
        info!(unit = %self.name, methods = self.methods.len(), "running test unit");
        listener.pre_run(self);

        if self.set_up() {
            if self.install() {
                for idx in 0..self.methods.len() {
                    self.run_method(idx, listener);
                }
            } else {
                warn!(unit = %self.name, "fixtures failed to install, skipping test methods");
            }
            self.uninstall();
            self.tear_down();
        } else {
            warn!(unit = %self.name, "set_up failed, skipping test methods");
        }

        self.context.method.clear();
        debug!(
            unit = %self.name,
            assertions = self.context.assertions.len(),
            failures = self.context.exceptions.len(),
            "test unit complete"
        );
        listener.post_run(self);
    }

    fn set_hook_policy(&mut self, policy: HookPolicy) {
        self.context.fixtures.set_policy(policy);
    }

    fn assertions(&self) -> AssertionCollection {
        self.context.assertions.clone()
    }

    fn exceptions(&self) -> Vec<TestFailure> {
        self.context.exceptions.clone()
    }

    fn benchmarks(&self) -> BenchmarkCollection {
        self.context.benchmarks.clone()
    }

    fn count(&self) -> usize {
        self.methods.len()
    }

    fn is_passed(&self) -> bool {
        self.context.assertions.is_passed() && self.context.exceptions.is_empty()
    }
}

// ============================================================================
// Error Trapping
// ============================================================================

enum Trapped {
    Error(anyhow::Error),
    Panic(Box<dyn Any + Send>),
}

impl Trapped {
    fn into_failure(self, kind: FailureKind, location: AssertionLocation) -> TestFailure {
        match self {
            Trapped::Error(err) => TestFailure::from_error(kind, &err, location),
            Trapped::Panic(payload) => TestFailure::from_panic(payload.as_ref(), location),
        }
    }
}

/// Run user code, turning errors and panics into a value.
fn trap(f: impl FnOnce() -> anyhow::Result<()>) -> Result<(), Trapped> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Trapped::Error(err)),
        Err(payload) => Err(Trapped::Panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Dependencies, FixtureData, HookResult};
    use crate::runnable::on_complete;

    #[derive(Default)]
    struct Arithmetic {
        runs: Vec<&'static str>,
    }

    impl TestCase for Arithmetic {
        fn methods(table: &mut MethodTable<Self>) {
            table
                .add("good", Self::good)
                .add("bad", Self::bad)
                .add("errors", Self::errors)
                .add("panics", Self::panics)
                .add("fatal", Self::fatal)
                .add("good", Self::bad);
        }
    }

    impl Arithmetic {
        fn good(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
            self.runs.push("good");
            ctx.assert(1 + 1 == 2, "addition works");
            Ok(())
        }

        fn bad(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
            self.runs.push("bad");
            ctx.assert_with_code(1 + 1 == 3, "addition is broken", 42);
            Ok(())
        }

        fn errors(&mut self, _ctx: &mut UnitContext) -> anyhow::Result<()> {
            self.runs.push("errors");
            anyhow::bail!("could not connect")
        }

        fn panics(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
            self.runs.push("panics");
            let numbers: Vec<u32> = Vec::new();
            let total = numbers[3] + 1;
            ctx.assert(total > 0, "unreachable");
            Ok(())
        }

        fn fatal(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
            self.runs.push("fatal");
            ctx.assert_fatal(false, "stop here")?;
            ctx.assert(true, "never recorded");
            Ok(())
        }
    }

    mod method_table_tests {
        use super::*;

        #[test]
        fn test_duplicates_ignored_and_order_kept() {
            let mut table = MethodTable::<Arithmetic>::new();
            Arithmetic::methods(&mut table);
            assert_eq!(
                table.names(),
                vec!["good", "bad", "errors", "panics", "fatal"]
            );
        }
    }

    mod run_tests {
        use super::*;

        #[test]
        fn test_every_method_runs_despite_failures() {
            let mut unit = TestUnit::new(Arithmetic::default());
            unit.run();

            assert_eq!(
                unit.case().runs,
                vec!["good", "bad", "errors", "panics", "fatal"]
            );
            assert_eq!(unit.count(), 5);
            assert_eq!(unit.exceptions().len(), 3);
            assert!(unit.is_failed());
        }

        #[test]
        fn test_assertions_partitioned() {
            let mut unit = TestUnit::new(Arithmetic::default());
            unit.run();

            let assertions = unit.assertions();
            let passed = assertions.passed();
            let failed = assertions.failed();
            assert_eq!(passed.len(), 1);
            assert_eq!(passed[0].message(), "addition works");
            assert_eq!(passed[0].test_class(), "Arithmetic");
            assert_eq!(passed[0].test_method(), "good");
            assert_eq!(failed.len(), 2);
            assert_eq!(failed[0].code(), 42);
            assert_eq!(failed[1].message(), "stop here");
        }

        #[test]
        fn test_failure_kinds_and_attribution() {
            let mut unit = TestUnit::new(Arithmetic::default());
            unit.run();

            let kinds: Vec<_> = unit
                .exceptions()
                .iter()
                .map(|f| (f.test_method().to_string(), f.kind()))
                .collect();
            assert_eq!(
                kinds,
                vec![
                    ("errors".to_string(), FailureKind::Error),
                    ("panics".to_string(), FailureKind::Panic),
                    ("fatal".to_string(), FailureKind::FatalAssertion),
                ]
            );
            assert_eq!(unit.method_exceptions("errors")[0].message(), "could not connect");
            assert!(unit.method_exceptions("errors")[0].location().file.ends_with("unit.rs"));
        }

        #[test]
        fn test_per_method_results() {
            let mut unit = TestUnit::new(Arithmetic::default());
            unit.run();

            assert!(unit.is_method_passed("good"));
            assert!(!unit.is_method_passed("bad"));
            assert!(!unit.is_method_passed("errors"));
            assert_eq!(unit.method_assertions("bad").len(), 1);
            assert!(unit.method_assertions("errors").is_empty());
        }

        #[test]
        fn test_on_complete_called_once() {
            let mut calls = Vec::new();
            let mut unit = TestUnit::new(Arithmetic::default()).with_name("Renamed");
            unit.run_with(&mut on_complete(|r| calls.push(r.name().to_string())));
            assert_eq!(calls, vec!["Renamed"]);
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[derive(Default)]
        struct Counter {
            data: FixtureData,
        }

        impl Fixture for Counter {
            fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
                self.data.set("installed", true);
                Ok(())
            }

            fn uninstall(&mut self, _deps: &Dependencies<'_>) -> HookResult {
                self.data.set("installed", false);
                Ok(())
            }

            fn data(&self) -> &FixtureData {
                &self.data
            }
        }

        #[derive(Default)]
        struct Failing;

        impl Fixture for Failing {
            fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
                anyhow::bail!("no database")
            }
        }

        #[derive(Default)]
        struct WithFixtures {
            seen_installed: bool,
            phases: Vec<&'static str>,
            broken: bool,
        }

        impl TestCase for WithFixtures {
            fn methods(table: &mut MethodTable<Self>) {
                table.add("reads_fixture", Self::reads_fixture);
            }

            fn set_up(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
                self.phases.push("set_up");
                ctx.set_fixture("counter", Counter::default())?;
                if self.broken {
                    ctx.set_fixture("failing", Failing)?;
                }
                ctx.benchmark("reads_fixture");
                Ok(())
            }

            fn tear_down(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
                self.phases.push("tear_down");
                let installed = ctx.fixture::<Counter>("counter")?.data()["installed"].clone();
                ctx.assert(installed == false, "uninstalled before tear_down");
                Ok(())
            }
        }

        impl WithFixtures {
            fn reads_fixture(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
                self.phases.push("method");
                self.seen_installed = ctx.fixture::<Counter>("counter")?.data()["installed"] == true;
                Ok(())
            }
        }

        #[derive(Default)]
        struct BrokenSetUp;

        impl TestCase for BrokenSetUp {
            fn methods(table: &mut MethodTable<Self>) {
                table.add("never", Self::never);
            }

            fn set_up(&mut self, _ctx: &mut UnitContext) -> anyhow::Result<()> {
                anyhow::bail!("missing configuration")
            }
        }

        impl BrokenSetUp {
            fn never(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
                ctx.assert(false, "should not run");
                Ok(())
            }
        }

        #[test]
        fn test_fixtures_installed_around_methods() {
            let mut unit = TestUnit::new(WithFixtures::default());
            unit.run();

            assert!(unit.case().seen_installed);
            assert_eq!(unit.case().phases, vec!["set_up", "method", "tear_down"]);
            assert!(unit.is_passed());
            assert!(unit.benchmarks().has("reads_fixture"));
            assert!(unit.benchmarks().get("reads_fixture").unwrap().stopped_at().is_some());
        }

        #[test]
        fn test_strict_install_failure_skips_methods() {
            let mut unit = TestUnit::new(WithFixtures {
                broken: true,
                ..WithFixtures::default()
            });
            unit.run();

            assert_eq!(unit.case().phases, vec!["set_up", "tear_down"]);
            let failures = unit.exceptions();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].kind(), FailureKind::FixtureHook);
            assert_eq!(failures[0].test_method(), "install");
        }

        #[test]
        fn test_lenient_install_failure_runs_methods() {
            let mut unit = TestUnit::new(WithFixtures {
                broken: true,
                ..WithFixtures::default()
            })
            .with_hook_policy(HookPolicy::Lenient);
            unit.run();

            assert_eq!(unit.case().phases, vec!["set_up", "method", "tear_down"]);
            let failures = unit.exceptions();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].test_method(), "Failing::install");
        }

        #[test]
        fn test_set_up_failure_skips_everything() {
            let mut unit = TestUnit::new(BrokenSetUp);
            unit.run();

            assert!(unit.assertions().is_empty());
            let failures = unit.exceptions();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].kind(), FailureKind::SetUp);
            assert_eq!(failures[0].message(), "missing configuration");
        }
    }
}
