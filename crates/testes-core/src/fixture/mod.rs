//! Fixtures: reusable test data with an init/install/uninstall lifecycle.
//!
//! A fixture declares the fixture types it depends on through
//! [`Fixture::dependencies`]. The [`FixtureManager`] resolves those
//! dependencies (default-constructing any that were not registered), and
//! hands each lifecycle hook a [`Dependencies`] view from which the fixture
//! reads its already-initialized dependencies by type.
//!
//! ```
//! use testes_core::fixture::{Dependencies, Dependency, Fixture, FixtureData, HookResult};
//!
//! #[derive(Default)]
//! struct Address {
//!     data: FixtureData,
//! }
//!
//! impl Fixture for Address {
//!     fn init(&mut self, _deps: &Dependencies<'_>) -> HookResult {
//!         self.data.set("street", "1 Main St");
//!         Ok(())
//!     }
//!
//!     fn data(&self) -> &FixtureData {
//!         &self.data
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Bob {
//!     data: FixtureData,
//! }
//!
//! impl Fixture for Bob {
//!     fn dependencies(&self) -> Vec<Dependency> {
//!         vec![Dependency::on::<Address>()]
//!     }
//!
//!     fn init(&mut self, deps: &Dependencies<'_>) -> HookResult {
//!         let address = deps.get::<Address>()?;
//!         self.data.set("address", address.data()["street"].clone());
//!         Ok(())
//!     }
//!
//!     fn data(&self) -> &FixtureData {
//!         &self.data
//!     }
//! }
//! ```

mod data;
mod manager;

pub use data::FixtureData;
pub use manager::{DependencyNode, FixtureManager, HookFailure, HookMethod, HookPolicy};

use std::any::{type_name, Any, TypeId};
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::names::short_type_name;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from fixture registration, resolution and lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// The fixture cannot be registered as declared.
    #[error("invalid fixture: {message}")]
    Validation { message: String },

    /// No fixture is registered under the name.
    #[error("fixture not found: {name}")]
    NotFound { name: String },

    /// The registered fixture is not of the requested type.
    #[error("fixture '{name}' is a {actual}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// The dependency graph contains a cycle.
    #[error("fixture dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A lifecycle hook returned an error or panicked.
    #[error("fixture hook {fixture}::{hook} failed: {message}")]
    Hook {
        fixture: String,
        hook: HookMethod,
        message: String,
    },
}

pub type FixtureResult<T> = Result<T, FixtureError>;

// ============================================================================
// Fixture Trait
// ============================================================================

/// Result of a fixture lifecycle hook.
pub type HookResult = anyhow::Result<()>;

/// Upcasting support for fixtures. Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn fixture_type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn fixture_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A unit of test data with a lifecycle.
///
/// Every hook has a no-op default. `init` runs at most once per manager;
/// `install` and `uninstall` run once per install/uninstall pass.
pub trait Fixture: AsAny {
    /// Fixture types this fixture needs before its hooks run.
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    fn init(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        Ok(())
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        Ok(())
    }

    fn uninstall(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        Ok(())
    }

    /// Map-like data exposed by the fixture.
    fn data(&self) -> &FixtureData {
        FixtureData::empty()
    }

    /// Stable identifier of the fixture's concrete type (hex SHA-256).
    fn hash_id(&self) -> String {
        let digest = Sha256::digest(self.fixture_type_name().as_bytes());
        hex::encode(digest)
    }
}

impl dyn Fixture {
    pub fn downcast_ref<F: Fixture>(&self) -> Option<&F> {
        self.as_any().downcast_ref::<F>()
    }

    pub fn downcast_mut<F: Fixture>(&mut self) -> Option<&mut F> {
        self.as_any_mut().downcast_mut::<F>()
    }

    pub fn is<F: Fixture>(&self) -> bool {
        self.as_any().is::<F>()
    }

    /// Concrete type id of the boxed fixture.
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn concrete_type_name(&self) -> &'static str {
        self.fixture_type_name()
    }
}

impl fmt::Debug for dyn Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(short_type_name(self.fixture_type_name()))
            .field("data", self.data())
            .finish()
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// A declared dependency on a fixture type.
///
/// Carries a constructor so the manager can register a default instance when
/// no fixture of the type was registered explicitly.
#[derive(Clone, Copy)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
    factory: fn() -> Box<dyn Fixture>,
}

fn construct<F: Fixture + Default>() -> Box<dyn Fixture> {
    Box::new(F::default())
}

impl Dependency {
    pub fn on<F: Fixture + Default>() -> Self {
        Dependency {
            type_id: TypeId::of::<F>(),
            type_name: type_name::<F>(),
            factory: construct::<F>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short name used when the dependency is registered automatically.
    pub fn name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Fixture> {
        (self.factory)()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.type_name).finish()
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Dependency {}

/// The resolved dependencies handed to a lifecycle hook.
pub struct Dependencies<'a> {
    fixtures: Vec<&'a dyn Fixture>,
}

impl<'a> Dependencies<'a> {
    pub(crate) fn new(fixtures: Vec<&'a dyn Fixture>) -> Self {
        Dependencies { fixtures }
    }

    /// Dependencies of a fixture that declares none.
    pub fn none() -> Self {
        Dependencies {
            fixtures: Vec::new(),
        }
    }

    /// The dependency of type `F`.
    pub fn get<F: Fixture>(&self) -> FixtureResult<&'a F> {
        self.fixtures
            .iter()
            .find_map(|fixture| {
                let fixture: &'a dyn Fixture = *fixture;
                fixture.downcast_ref::<F>()
            })
            .ok_or_else(|| FixtureError::NotFound {
                name: short_type_name(type_name::<F>()).to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a dyn Fixture> + '_ {
        self.fixtures.iter().copied()
    }
}

// ============================================================================
// Lifecycle State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    Uninitialized,
    Initialized,
    Installed,
    Uninstalled,
    /// A hook failed under the lenient policy.
    Failed,
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FixtureState::Uninitialized => "uninitialized",
            FixtureState::Initialized => "initialized",
            FixtureState::Installed => "installed",
            FixtureState::Uninstalled => "uninstalled",
            FixtureState::Failed => "failed",
        };
        f.write_str(label)
    }
}
