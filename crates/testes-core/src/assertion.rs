//! Assertion and failure records.
//!
//! An [`Assertion`] is the immutable result of one boolean check made while a
//! test method runs. Assertion failures are data, never control flow: a false
//! assertion is recorded and the method keeps running.
//!
//! A [`TestFailure`] is the record of an unexpected error (an `Err` returned by
//! a test method, a panic, a fatal assertion or a failing fixture hook),
//! attributed to the test class and method that raised it.

use std::any::Any;
use std::fmt;
use std::panic::Location as CallerLocation;

use serde::Serialize;
use thiserror::Error;

/// Code recorded when an assertion does not specify one.
pub const DEFAULT_CODE: i32 = 0;

// ============================================================================
// Location
// ============================================================================

/// Where an assertion or failure was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionLocation {
    /// Source file of the call site.
    pub file: String,
    /// 1-indexed line of the call site.
    pub line: u32,
    /// Name of the test unit.
    pub test_class: String,
    /// Name of the test method (or lifecycle phase).
    pub test_method: String,
}

impl AssertionLocation {
    /// Create a location from its parts.
    pub fn new(
        file: impl Into<String>,
        line: u32,
        test_class: impl Into<String>,
        test_method: impl Into<String>,
    ) -> Self {
        AssertionLocation {
            file: file.into(),
            line,
            test_class: test_class.into(),
            test_method: test_method.into(),
        }
    }

    /// Create a location pointing at the caller of the enclosing
    /// `#[track_caller]` function.
    #[track_caller]
    pub fn caller(test_class: impl Into<String>, test_method: impl Into<String>) -> Self {
        let caller = CallerLocation::caller();
        AssertionLocation::new(caller.file(), caller.line(), test_class, test_method)
    }
}

impl fmt::Display for AssertionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}() in {}:{}",
            self.test_class, self.test_method, self.file, self.line
        )
    }
}

// ============================================================================
// Assertion
// ============================================================================

/// One recorded boolean check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    passed: bool,
    message: String,
    code: i32,
    location: AssertionLocation,
}

impl Assertion {
    /// Record the result of `expression`.
    pub fn new(
        expression: bool,
        message: impl Into<String>,
        code: i32,
        location: AssertionLocation,
    ) -> Self {
        Assertion {
            passed: expression,
            message: message.into(),
            code,
            location,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.passed
    }

    pub fn is_failed(&self) -> bool {
        !self.passed
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn location(&self) -> &AssertionLocation {
        &self.location
    }

    pub fn test_file(&self) -> &str {
        &self.location.file
    }

    pub fn test_line(&self) -> u32 {
        self.location.line
    }

    pub fn test_class(&self) -> &str {
        &self.location.test_class
    }

    pub fn test_method(&self) -> &str {
        &self.location.test_method
    }
}

// ============================================================================
// Assertion Collection
// ============================================================================

/// Ordered collection of assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssertionCollection {
    assertions: Vec<Assertion>,
}

impl AssertionCollection {
    pub fn new() -> Self {
        AssertionCollection::default()
    }

    /// Append an assertion.
    pub fn add(&mut self, assertion: Assertion) -> &mut Self {
        self.assertions.push(assertion);
        self
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Assertion> {
        self.assertions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Assertion> {
        self.assertions.iter()
    }

    /// Assertions that passed, in recording order.
    pub fn passed(&self) -> Vec<&Assertion> {
        self.assertions.iter().filter(|a| a.is_passed()).collect()
    }

    /// Assertions that failed, in recording order.
    pub fn failed(&self) -> Vec<&Assertion> {
        self.assertions.iter().filter(|a| a.is_failed()).collect()
    }

    /// True when no assertion failed (an empty collection has passed).
    pub fn is_passed(&self) -> bool {
        self.assertions.iter().all(Assertion::is_passed)
    }

    pub fn is_failed(&self) -> bool {
        !self.is_passed()
    }
}

impl<'a> IntoIterator for &'a AssertionCollection {
    type Item = &'a Assertion;
    type IntoIter = std::slice::Iter<'a, Assertion>;

    fn into_iter(self) -> Self::IntoIter {
        self.assertions.iter()
    }
}

impl IntoIterator for AssertionCollection {
    type Item = Assertion;
    type IntoIter = std::vec::IntoIter<Assertion>;

    fn into_iter(self) -> Self::IntoIter {
        self.assertions.into_iter()
    }
}

impl Extend<Assertion> for AssertionCollection {
    fn extend<I: IntoIterator<Item = Assertion>>(&mut self, iter: I) {
        self.assertions.extend(iter);
    }
}

impl FromIterator<Assertion> for AssertionCollection {
    fn from_iter<I: IntoIterator<Item = Assertion>>(iter: I) -> Self {
        AssertionCollection {
            assertions: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Fatal Assertions
// ============================================================================

/// Raised by `assert_fatal` when its expression is false.
///
/// Test methods propagate it with `?` to stop the method; the unit records it
/// as a [`FailureKind::FatalAssertion`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fatal assertion failed: {message}")]
pub struct FatalAssertion {
    pub message: String,
    pub code: i32,
}

// ============================================================================
// Failures
// ============================================================================

/// What kind of unexpected error a failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A test method returned an error.
    Error,
    /// A test method panicked.
    Panic,
    /// A fatal assertion stopped a test method.
    FatalAssertion,
    /// The unit's set-up failed; its methods were skipped.
    SetUp,
    /// The unit's tear-down failed.
    TearDown,
    /// A fixture lifecycle hook failed.
    FixtureHook,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Error => "error",
            FailureKind::Panic => "panic",
            FailureKind::FatalAssertion => "fatal assertion",
            FailureKind::SetUp => "set-up failure",
            FailureKind::TearDown => "tear-down failure",
            FailureKind::FixtureHook => "fixture hook failure",
        };
        f.write_str(label)
    }
}

/// An unexpected error captured while running a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    kind: FailureKind,
    message: String,
    code: i32,
    location: AssertionLocation,
}

impl TestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>, location: AssertionLocation) -> Self {
        TestFailure {
            kind,
            message: message.into(),
            code: DEFAULT_CODE,
            location,
        }
    }

    /// Build a failure from an error returned by user code.
    ///
    /// A [`FatalAssertion`] keeps its own kind and code; anything else is
    /// recorded as `kind` with the full error chain as its message.
    pub fn from_error(kind: FailureKind, err: &anyhow::Error, location: AssertionLocation) -> Self {
        if let Some(fatal) = err.downcast_ref::<FatalAssertion>() {
            return TestFailure::new(FailureKind::FatalAssertion, fatal.message.clone(), location)
                .with_code(fatal.code);
        }
        TestFailure::new(kind, format!("{:#}", err), location)
    }

    /// Build a failure from a panic payload caught with `catch_unwind`.
    pub fn from_panic(payload: &(dyn Any + Send), location: AssertionLocation) -> Self {
        TestFailure::new(FailureKind::Panic, panic_message(payload), location)
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn location(&self) -> &AssertionLocation {
        &self.location
    }

    pub fn test_class(&self) -> &str {
        &self.location.test_class
    }

    pub fn test_method(&self) -> &str {
        &self.location.test_method
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.location, self.message)
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
