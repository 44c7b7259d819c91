//! Testes: a unit-testing framework with fixture dependency management and
//! coverage analysis.
//!
//! Test cases register their methods explicitly, run inside [`unit::TestUnit`]s
//! composed into [`suite::Suite`]s, and record assertions as data. Fixtures
//! declare their dependencies and are initialized once, installed in
//! dependency order and uninstalled in reverse. Coverage data recorded during
//! a run is folded into per-file and aggregate percentages.

// Core infrastructure - re-exported from testes-core
pub use testes_core::assertion;
pub use testes_core::benchmark;
pub use testes_core::coverage;
pub use testes_core::error;
pub use testes_core::fixture;
pub use testes_core::names;
pub use testes_core::runnable;
pub use testes_core::story;
pub use testes_core::suite;
pub use testes_core::unit;

// Outer surface: configuration, logging, discovery and the run driver
pub mod config;
pub mod finder;
pub mod logging;
pub mod runner;

// Error bridges - converts root-crate errors to TestesError
// (must be after config and finder for From impls to work)
mod error_bridges;
