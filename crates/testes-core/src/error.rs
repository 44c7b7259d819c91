//! Error types and error code constants for testes.
//!
//! This module provides a unified error type (`TestesError`) that bridges
//! domain-specific errors from the subsystems (fixtures, benchmarks, stories,
//! coverage) into a common format with a stable numeric code.
//!
//! ## Error Code Mapping
//!
//! - `1`: Tests failed (an assertion failed or a failure was recorded)
//! - `2`: Invalid configuration (bad environment value or override)
//! - `3`: Not found (unregistered fixture, missing file, missing test root)
//! - `4`: Fixture failure (validation, cycle, failing lifecycle hook)
//! - `10`: Internal errors (I/O, malformed probe output, unexpected state)
//!
//! Assertion failures never become a `TestesError`; they are recorded as data
//! on the unit that made them. The `TestsFailed` code is only produced from a
//! finished run's outcome.

use std::fmt;

use thiserror::Error;

use crate::benchmark::BenchmarkError;
use crate::coverage::CoverageError;
use crate::fixture::FixtureError;
use crate::story::StoryError;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable error codes, usable as process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// At least one assertion failed or one failure was recorded.
    TestsFailed = 1,
    /// Invalid configuration value.
    InvalidConfiguration = 2,
    /// A named fixture, benchmark, file or root was not found.
    NotFound = 3,
    /// Fixture graph or lifecycle failure.
    FixtureFailure = 4,
    /// Internal errors (I/O, malformed data, unexpected state).
    InternalError = 10,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for everything outside a single test method.
#[derive(Debug, Error)]
pub enum TestesError {
    /// Fixture registration, resolution or lifecycle error.
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// Coverage loading or analysis error.
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    /// Benchmark lookup error.
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    /// Story step error.
    #[error(transparent)]
    Story(#[from] StoryError),

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Something named was not found.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type TestesResult<T> = Result<T, TestesError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&TestesError> for ErrorCode {
    fn from(err: &TestesError) -> Self {
        match err {
            TestesError::Fixture(FixtureError::NotFound { .. }) => ErrorCode::NotFound,
            TestesError::Fixture(_) => ErrorCode::FixtureFailure,
            TestesError::Coverage(
                CoverageError::FileNotFound { .. }
                | CoverageError::NotAFile { .. }
                | CoverageError::NotADirectory { .. },
            ) => ErrorCode::NotFound,
            TestesError::Coverage(CoverageError::InvalidPattern { .. }) => {
                ErrorCode::InvalidConfiguration
            }
            TestesError::Coverage(_) => ErrorCode::InternalError,
            TestesError::Benchmark(BenchmarkError::NotFound { .. }) => ErrorCode::NotFound,
            TestesError::Story(StoryError::UndefinedStep { .. }) => ErrorCode::NotFound,
            TestesError::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            TestesError::NotFound { .. } => ErrorCode::NotFound,
            TestesError::Internal { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<TestesError> for ErrorCode {
    fn from(err: TestesError) -> Self {
        ErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl TestesError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        TestesError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        TestesError::NotFound { what: what.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        TestesError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
