//! Error bridge implementations for root-crate errors.
//!
//! This module provides `impl From<X> for TestesError` conversions for the
//! error types owned by the root crate (configuration and discovery).

use testes_core::error::TestesError;

use crate::config::ConfigError;
use crate::finder::FinderError;

// ============================================================================
// Bridge: ConfigError -> TestesError
// ============================================================================

impl From<ConfigError> for TestesError {
    fn from(err: ConfigError) -> Self {
        TestesError::invalid_configuration(err.to_string())
    }
}

// ============================================================================
// Bridge: FinderError -> TestesError
// ============================================================================

impl From<FinderError> for TestesError {
    fn from(err: FinderError) -> Self {
        match err {
            FinderError::RootNotFound { path } => {
                TestesError::not_found(format!("test root {}", path.display()))
            }
            FinderError::Io(io_err) => TestesError::internal(io_err.to_string()),
        }
    }
}
