//! Core infrastructure for testes.
//!
//! This crate provides the language-agnostic pieces of the framework:
//! - Assertion records and failure records
//! - Benchmarks keyed by test method
//! - Fixtures and the fixture dependency manager
//! - Test units, stories and suites
//! - Coverage results, line classification and the coverage analyzer
//! - Error types and error codes

pub mod assertion;
pub mod benchmark;
pub mod coverage;
pub mod error;
pub mod fixture;
pub mod names;
pub mod runnable;
pub mod story;
pub mod suite;
pub mod unit;
