//! Fixture registry and dependency-ordered lifecycle.
//!
//! The manager owns every fixture for one run. Fixtures are deduplicated by
//! concrete type: registering a second fixture of an already-registered type
//! only adds a name for the existing instance.
//!
//! ## Lifecycle
//!
//! - [`FixtureManager::resolve`] registers a default instance for every
//!   dependency that is not registered yet, then walks the graph and fails
//!   with [`FixtureError::Cycle`] before any hook runs.
//! - [`FixtureManager::install`] installs fixtures in registration order,
//!   dependencies first. `init` runs at most once per fixture for the lifetime
//!   of the manager.
//! - [`FixtureManager::uninstall`] uninstalls every installed fixture only
//!   after all of its dependents have been uninstalled.
//!
//! ## Hook Failures
//!
//! Under [`HookPolicy::Strict`] the first failing hook aborts the operation
//! with [`FixtureError::Hook`]. Under [`HookPolicy::Lenient`] the failure is
//! recorded in the error log under `Type::hook`, the fixture is marked
//! [`FixtureState::Failed`] and the operation continues.

use std::any::{type_name, TypeId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use super::{Dependencies, Dependency, Fixture, FixtureError, FixtureResult, FixtureState};
use crate::assertion::panic_message;
use crate::names::short_type_name;

// ============================================================================
// Hook Policy
// ============================================================================

/// How failing lifecycle hooks are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPolicy {
    /// Propagate the first hook failure.
    #[default]
    Strict,
    /// Record hook failures per fixture and keep going.
    Lenient,
}

impl FromStr for HookPolicy {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(HookPolicy::Strict),
            "lenient" => Ok(HookPolicy::Lenient),
            other => Err(FixtureError::Validation {
                message: format!("unknown hook policy '{}' (expected strict or lenient)", other),
            }),
        }
    }
}

impl fmt::Display for HookPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPolicy::Strict => f.write_str("strict"),
            HookPolicy::Lenient => f.write_str("lenient"),
        }
    }
}

/// A fixture lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookMethod {
    Init,
    Install,
    Uninstall,
}

impl fmt::Display for HookMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookMethod::Init => f.write_str("init"),
            HookMethod::Install => f.write_str("install"),
            HookMethod::Uninstall => f.write_str("uninstall"),
        }
    }
}

/// A hook failure recorded under the lenient policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub fixture: String,
    pub hook: HookMethod,
    pub message: String,
}

impl HookFailure {
    /// Error log key, `Type::hook`.
    pub fn key(&self) -> String {
        format!("{}::{}", self.fixture, self.hook)
    }
}

impl From<HookFailure> for FixtureError {
    fn from(failure: HookFailure) -> Self {
        FixtureError::Hook {
            fixture: failure.fixture,
            hook: failure.hook,
            message: failure.message,
        }
    }
}

// ============================================================================
// Dependency Tree
// ============================================================================

/// Serializable view of a fixture and its resolved dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub name: String,
    pub type_name: String,
    /// `None` when the dependency is not registered yet.
    pub state: Option<FixtureState>,
    pub dependencies: Vec<DependencyNode>,
}

// ============================================================================
// Fixture Manager
// ============================================================================

struct Slot {
    /// Name the fixture was first registered under.
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    /// `None` only while one of the fixture's own hooks is running.
    fixture: Option<Box<dyn Fixture>>,
    dependencies: Vec<Dependency>,
    state: FixtureState,
    initialized: bool,
}

impl Slot {
    fn label(&self) -> &str {
        short_type_name(self.type_name)
    }
}

/// Owns the fixtures of one run and drives their lifecycle.
pub struct FixtureManager {
    slots: Vec<Slot>,
    /// Registered names in registration order, each pointing at a slot.
    aliases: Vec<(String, usize)>,
    policy: HookPolicy,
    errors: Vec<HookFailure>,
}

impl Default for FixtureManager {
    fn default() -> Self {
        FixtureManager::new()
    }
}

impl fmt::Debug for FixtureManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureManager")
            .field("names", &self.names())
            .field("policy", &self.policy)
            .field("errors", &self.errors)
            .finish()
    }
}

impl FixtureManager {
    pub fn new() -> Self {
        FixtureManager::with_policy(HookPolicy::default())
    }

    pub fn with_policy(policy: HookPolicy) -> Self {
        FixtureManager {
            slots: Vec::new(),
            aliases: Vec::new(),
            policy,
            errors: Vec::new(),
        }
    }

    pub fn policy(&self) -> HookPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: HookPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Register `fixture` under `name`.
    ///
    /// When a fixture of the same concrete type is already registered, the
    /// new instance is dropped and `name` refers to the existing one.
    pub fn set<F: Fixture>(&mut self, name: impl Into<String>, fixture: F) -> FixtureResult<&mut Self> {
        self.register(name.into(), TypeId::of::<F>(), type_name::<F>(), Box::new(fixture))
    }

    /// Register an already boxed fixture under `name`.
    pub fn set_boxed(
        &mut self,
        name: impl Into<String>,
        fixture: Box<dyn Fixture>,
    ) -> FixtureResult<&mut Self> {
        let type_id = fixture.concrete_type_id();
        let type_name = fixture.concrete_type_name();
        self.register(name.into(), type_id, type_name, fixture)
    }

    fn register(
        &mut self,
        name: String,
        type_id: TypeId,
        type_name: &'static str,
        fixture: Box<dyn Fixture>,
    ) -> FixtureResult<&mut Self> {
        if name.trim().is_empty() {
            return Err(FixtureError::Validation {
                message: format!("fixture {} registered with an empty name", type_name),
            });
        }

        let idx = match self.slot_by_type(type_id) {
            Some(idx) => {
                debug!(
                    name = %name,
                    existing = %self.slots[idx].name,
                    "fixture type already registered, reusing instance"
                );
                idx
            }
            None => {
                let dependencies = fixture.dependencies();
                validate_dependencies(type_name, type_id, &dependencies)?;
                debug!(name = %name, fixture = type_name, "registering fixture");
                self.slots.push(Slot {
                    name: name.clone(),
                    type_id,
                    type_name,
                    fixture: Some(fixture),
                    dependencies,
                    state: FixtureState::Uninitialized,
                    initialized: false,
                });
                self.slots.len() - 1
            }
        };

        match self.aliases.iter_mut().find(|(alias, _)| *alias == name) {
            Some(entry) => entry.1 = idx,
            None => self.aliases.push((name, idx)),
        }
        Ok(self)
    }

    /// The fixture registered under `name`.
    pub fn get(&self, name: &str) -> FixtureResult<&dyn Fixture> {
        let idx = self.slot_by_name(name)?;
        self.slots[idx]
            .fixture
            .as_deref()
            .ok_or_else(|| not_found(name))
    }

    /// The fixture registered under `name`, downcast to `F`.
    pub fn get_as<F: Fixture>(&self, name: &str) -> FixtureResult<&F> {
        let fixture = self.get(name)?;
        fixture
            .downcast_ref::<F>()
            .ok_or_else(|| type_mismatch::<F>(name, fixture))
    }

    pub fn get_mut_as<F: Fixture>(&mut self, name: &str) -> FixtureResult<&mut F> {
        let idx = self.slot_by_name(name)?;
        let fixture = self.slots[idx]
            .fixture
            .as_deref_mut()
            .ok_or_else(|| not_found(name))?;
        if !fixture.is::<F>() {
            return Err(type_mismatch::<F>(name, fixture));
        }
        fixture
            .downcast_mut::<F>()
            .ok_or_else(|| not_found(name))
    }

    /// The fixture of type `F`, regardless of the name it was registered under.
    pub fn get_by_type<F: Fixture>(&self) -> FixtureResult<&F> {
        self.slot_by_type(TypeId::of::<F>())
            .and_then(|idx| self.slots[idx].fixture.as_deref())
            .and_then(|fixture| fixture.downcast_ref::<F>())
            .ok_or_else(|| not_found(short_type_name(type_name::<F>())))
    }

    pub fn has(&self, name: &str) -> bool {
        self.aliases.iter().any(|(alias, _)| alias == name)
    }

    /// Remove the name. The fixture instance stays owned by the manager.
    pub fn remove(&mut self, name: &str) -> FixtureResult<&mut Self> {
        let pos = self
            .aliases
            .iter()
            .position(|(alias, _)| alias == name)
            .ok_or_else(|| not_found(name))?;
        self.aliases.remove(pos);
        Ok(self)
    }

    /// Number of distinct fixture instances.
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.aliases.iter().map(|(alias, _)| alias.as_str()).collect()
    }

    pub fn state(&self, name: &str) -> FixtureResult<FixtureState> {
        let idx = self.slot_by_name(name)?;
        Ok(self.slots[idx].state)
    }

    /// Hook failures recorded under the lenient policy.
    pub fn errors(&self) -> &[HookFailure] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<HookFailure> {
        std::mem::take(&mut self.errors)
    }

    // ------------------------------------------------------------------------
    // Graph
    // ------------------------------------------------------------------------

    /// Register missing dependencies and reject cyclic graphs.
    pub fn resolve(&mut self) -> FixtureResult<()> {
        let mut idx = 0;
        while idx < self.slots.len() {
            let dependencies = self.slots[idx].dependencies.clone();
            for dependency in dependencies {
                if self.slot_by_type(dependency.type_id()).is_some() {
                    continue;
                }
                let name = if self.has(dependency.name()) {
                    dependency.type_name().to_string()
                } else {
                    dependency.name().to_string()
                };
                debug!(
                    fixture = %name,
                    dependent = self.slots[idx].label(),
                    "auto-registering fixture dependency"
                );
                let fixture = dependency.instantiate();
                self.register(name, dependency.type_id(), dependency.type_name(), fixture)?;
            }
            idx += 1;
        }
        self.check_cycles()
    }

    fn check_cycles(&self) -> FixtureResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            manager: &FixtureManager,
            idx: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> FixtureResult<()> {
            match marks[idx] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    let start = stack.iter().position(|&s| s == idx).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|&s| manager.slots[s].label().to_string())
                        .collect();
                    path.push(manager.slots[idx].label().to_string());
                    return Err(FixtureError::Cycle { path });
                }
                Mark::New => {}
            }
            marks[idx] = Mark::Active;
            stack.push(idx);
            for dep in manager.dependency_indices(idx)? {
                visit(manager, dep, marks, stack)?;
            }
            stack.pop();
            marks[idx] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.slots.len()];
        let mut stack = Vec::new();
        for idx in 0..self.slots.len() {
            visit(self, idx, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    /// Tree of each registered fixture and its dependencies, in registration order.
    pub fn dependency_tree(&self) -> Vec<DependencyNode> {
        let mut visiting = Vec::new();
        (0..self.slots.len())
            .map(|idx| self.node(idx, &mut visiting))
            .collect()
    }

    fn node(&self, idx: usize, visiting: &mut Vec<usize>) -> DependencyNode {
        let slot = &self.slots[idx];
        let mut node = DependencyNode {
            name: slot.name.clone(),
            type_name: slot.type_name.to_string(),
            state: Some(slot.state),
            dependencies: Vec::new(),
        };
        if visiting.contains(&idx) {
            return node;
        }
        visiting.push(idx);
        for dependency in &slot.dependencies {
            let child = match self.slot_by_type(dependency.type_id()) {
                Some(dep) => self.node(dep, visiting),
                None => DependencyNode {
                    name: dependency.name().to_string(),
                    type_name: dependency.type_name().to_string(),
                    state: None,
                    dependencies: Vec::new(),
                },
            };
            node.dependencies.push(child);
        }
        visiting.pop();
        node
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Install every registered fixture, dependencies first.
    pub fn install(&mut self) -> FixtureResult<()> {
        self.resolve()?;
        for idx in 0..self.slots.len() {
            self.install_slot(idx)?;
        }
        Ok(())
    }

    /// Uninstall every installed fixture, dependents first.
    pub fn uninstall(&mut self) -> FixtureResult<()> {
        for idx in 0..self.slots.len() {
            self.uninstall_slot(idx)?;
        }
        Ok(())
    }

    fn install_slot(&mut self, idx: usize) -> FixtureResult<()> {
        if matches!(
            self.slots[idx].state,
            FixtureState::Installed | FixtureState::Failed
        ) {
            return Ok(());
        }
        let deps = self.dependency_indices(idx)?;
        for &dep in &deps {
            self.install_slot(dep)?;
        }
        if let Some(&failed) = deps
            .iter()
            .find(|&&dep| self.slots[dep].state != FixtureState::Installed)
        {
            let failure = HookFailure {
                fixture: self.slots[idx].label().to_string(),
                hook: HookMethod::Install,
                message: format!("dependency {} failed", self.slots[failed].label()),
            };
            return self.fail_hook(idx, failure).map(|_| ());
        }

        if !self.slots[idx].initialized {
            self.slots[idx].initialized = true;
            if !self.run_hook(idx, HookMethod::Init)? {
                return Ok(());
            }
            self.slots[idx].state = FixtureState::Initialized;
        }

        if self.run_hook(idx, HookMethod::Install)? {
            debug!(fixture = self.slots[idx].label(), "installed fixture");
            self.slots[idx].state = FixtureState::Installed;
        }
        Ok(())
    }

    fn uninstall_slot(&mut self, idx: usize) -> FixtureResult<()> {
        if self.slots[idx].state != FixtureState::Installed {
            return Ok(());
        }
        for dependent in self.dependent_indices(idx) {
            self.uninstall_slot(dependent)?;
        }
        if self.run_hook(idx, HookMethod::Uninstall)? {
            debug!(fixture = self.slots[idx].label(), "uninstalled fixture");
            self.slots[idx].state = FixtureState::Uninstalled;
        }
        Ok(())
    }

    /// Run one hook on a slot.
    ///
    /// Returns `Ok(false)` when the hook failed under the lenient policy.
    fn run_hook(&mut self, idx: usize, hook: HookMethod) -> FixtureResult<bool> {
        let dep_indices = self.dependency_indices(idx)?;
        let label = self.slots[idx].label().to_string();
        let mut target = self.slots[idx]
            .fixture
            .take()
            .ok_or_else(|| not_found(&label))?;

        let outcome = {
            let fixtures = dep_indices
                .iter()
                .filter_map(|&dep| self.slots[dep].fixture.as_deref())
                .collect();
            let deps = Dependencies::new(fixtures);
            catch_unwind(AssertUnwindSafe(|| match hook {
                HookMethod::Init => target.init(&deps),
                HookMethod::Install => target.install(&deps),
                HookMethod::Uninstall => target.uninstall(&deps),
            }))
        };
        self.slots[idx].fixture = Some(target);

        let message = match outcome {
            Ok(Ok(())) => return Ok(true),
            Ok(Err(err)) => format!("{:#}", err),
            Err(payload) => panic_message(payload.as_ref()),
        };
        let failure = HookFailure {
            fixture: label,
            hook,
            message,
        };
        self.fail_hook(idx, failure)
    }

    /// Apply the hook policy to a failure: strict propagates it, lenient marks the
    /// fixture failed and logs it.
    fn fail_hook(&mut self, idx: usize, failure: HookFailure) -> FixtureResult<bool> {
        match self.policy {
            HookPolicy::Strict => Err(failure.into()),
            HookPolicy::Lenient => {
                warn!(key = %failure.key(), message = %failure.message, "fixture hook failed");
                self.slots[idx].state = FixtureState::Failed;
                self.errors.push(failure);
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------------

    fn slot_by_type(&self, type_id: TypeId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.type_id == type_id)
    }

    fn slot_by_name(&self, name: &str) -> FixtureResult<usize> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias == name)
            .map(|(_, idx)| *idx)
            .ok_or_else(|| not_found(name))
    }

    fn dependency_indices(&self, idx: usize) -> FixtureResult<Vec<usize>> {
        self.slots[idx]
            .dependencies
            .iter()
            .map(|dependency| {
                self.slot_by_type(dependency.type_id())
                    .ok_or_else(|| not_found(dependency.name()))
            })
            .collect()
    }

    fn dependent_indices(&self, idx: usize) -> Vec<usize> {
        let type_id = self.slots[idx].type_id;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.dependencies.iter().any(|d| d.type_id() == type_id))
            .map(|(i, _)| i)
            .collect()
    }
}

fn validate_dependencies(
    type_name: &str,
    type_id: TypeId,
    dependencies: &[Dependency],
) -> FixtureResult<()> {
    for (i, dependency) in dependencies.iter().enumerate() {
        if dependencies[..i].contains(dependency) {
            return Err(FixtureError::Validation {
                message: format!(
                    "fixture {} declares dependency {} more than once",
                    type_name,
                    dependency.type_name()
                ),
            });
        }
        if dependency.type_id() == type_id {
            let name = short_type_name(type_name).to_string();
            return Err(FixtureError::Cycle {
                path: vec![name.clone(), name],
            });
        }
    }
    Ok(())
}

fn not_found(name: &str) -> FixtureError {
    FixtureError::NotFound {
        name: name.to_string(),
    }
}

fn type_mismatch<F: Fixture>(name: &str, actual: &dyn Fixture) -> FixtureError {
    FixtureError::TypeMismatch {
        name: name.to_string(),
        expected: short_type_name(type_name::<F>()).to_string(),
        actual: short_type_name(actual.concrete_type_name()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureData;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    thread_local! {
        static JOURNAL: Journal = Rc::new(RefCell::new(Vec::new()));
    }

    fn log(entry: impl Into<String>) {
        JOURNAL.with(|j| j.borrow_mut().push(entry.into()));
    }

    fn take_log() -> Vec<String> {
        JOURNAL.with(|j| std::mem::take(&mut *j.borrow_mut()))
    }

    #[derive(Default)]
    struct Address {
        data: FixtureData,
    }

    impl Fixture for Address {
        fn init(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Address::init");
            self.data.set("street", "1 Main St");
            Ok(())
        }

        fn install(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Address::install");
            Ok(())
        }

        fn uninstall(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Address::uninstall");
            Ok(())
        }

        fn data(&self) -> &FixtureData {
            &self.data
        }
    }

    #[derive(Debug, Default)]
    struct Bob {
        data: FixtureData,
    }

    impl Fixture for Bob {
        fn dependencies(&self) -> Vec<Dependency> {
            vec![Dependency::on::<Address>()]
        }

        fn init(&mut self, deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Bob::init");
            let address = deps.get::<Address>()?;
            self.data.set("address", address.data()["street"].clone());
            Ok(())
        }

        fn install(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Bob::install");
            Ok(())
        }

        fn uninstall(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            log("Bob::uninstall");
            Ok(())
        }

        fn data(&self) -> &FixtureData {
            &self.data
        }
    }

    #[derive(Default)]
    struct Broken;

    impl Fixture for Broken {
        fn install(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            anyhow::bail!("database unavailable")
        }
    }

    #[derive(Default)]
    struct Panicky;

    impl Fixture for Panicky {
        fn init(&mut self, _deps: &Dependencies<'_>) -> crate::fixture::HookResult {
            panic!("init exploded")
        }
    }

    #[derive(Default)]
    struct Ping;

    impl Fixture for Ping {
        fn dependencies(&self) -> Vec<Dependency> {
            vec![Dependency::on::<Pong>()]
        }
    }

    #[derive(Default)]
    struct Pong;

    impl Fixture for Pong {
        fn dependencies(&self) -> Vec<Dependency> {
            vec![Dependency::on::<Ping>()]
        }
    }

    #[derive(Default)]
    struct Narcissus;

    impl Fixture for Narcissus {
        fn dependencies(&self) -> Vec<Dependency> {
            vec![Dependency::on::<Narcissus>()]
        }
    }

    #[derive(Default)]
    struct Twice;

    impl Fixture for Twice {
        fn dependencies(&self) -> Vec<Dependency> {
            vec![Dependency::on::<Address>(), Dependency::on::<Address>()]
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn test_get_missing_is_not_found() {
            let manager = FixtureManager::new();
            assert_eq!(
                manager.get("nobody").unwrap_err(),
                FixtureError::NotFound {
                    name: "nobody".to_string()
                }
            );
        }

        #[test]
        fn test_first_registration_of_a_type_wins() {
            let mut manager = FixtureManager::new();
            let mut first = Address::default();
            first.data.set("street", "first");
            let mut second = Address::default();
            second.data.set("street", "second");

            manager.set("home", first).unwrap();
            manager.set("work", second).unwrap();

            assert_eq!(manager.count(), 1);
            assert_eq!(manager.names(), vec!["home", "work"]);
            assert_eq!(
                manager.get_as::<Address>("work").unwrap().data()["street"],
                "first"
            );
        }

        #[test]
        fn test_empty_name_is_validation_error() {
            let mut manager = FixtureManager::new();
            let err = manager.set("  ", Address::default()).unwrap_err();
            assert!(matches!(err, FixtureError::Validation { .. }));
        }

        #[test]
        fn test_duplicate_dependency_is_validation_error() {
            let mut manager = FixtureManager::new();
            let err = manager.set("twice", Twice).unwrap_err();
            assert!(matches!(err, FixtureError::Validation { .. }));
        }

        #[test]
        fn test_type_mismatch() {
            let mut manager = FixtureManager::new();
            manager.set("address", Address::default()).unwrap();
            let err = manager.get_as::<Bob>("address").unwrap_err();
            assert_eq!(
                err,
                FixtureError::TypeMismatch {
                    name: "address".to_string(),
                    expected: "Bob".to_string(),
                    actual: "Address".to_string(),
                }
            );
        }

        #[test]
        fn test_remove_drops_only_the_name() {
            let mut manager = FixtureManager::new();
            manager.set("address", Address::default()).unwrap();
            manager.remove("address").unwrap();
            assert!(!manager.has("address"));
            assert_eq!(manager.count(), 1);
            assert!(manager.remove("address").is_err());
        }

        #[test]
        fn test_set_boxed_keeps_concrete_type() {
            let mut manager = FixtureManager::new();
            manager
                .set_boxed("address", Box::new(Address::default()))
                .unwrap();
            assert!(manager.get_by_type::<Address>().is_ok());
            assert!(manager.get_as::<Address>("address").is_ok());
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_dependency_auto_registered_and_installed_first() {
            take_log();
            let mut manager = FixtureManager::new();
            manager.set("bob", Bob::default()).unwrap();
            manager.install().unwrap();

            assert!(manager.has("Address"));
            assert_eq!(manager.state("bob").unwrap(), FixtureState::Installed);
            assert_eq!(manager.state("Address").unwrap(), FixtureState::Installed);
            assert_eq!(
                take_log(),
                vec!["Address::init", "Address::install", "Bob::init", "Bob::install"]
            );
            assert_eq!(
                manager.get_as::<Bob>("bob").unwrap().data()["address"],
                "1 Main St"
            );
        }

        #[test]
        fn test_init_is_memoized_across_installs() {
            take_log();
            let mut manager = FixtureManager::new();
            manager.set("bob", Bob::default()).unwrap();
            manager.install().unwrap();
            manager.install().unwrap();
            manager.uninstall().unwrap();
            manager.install().unwrap();

            let log = take_log();
            assert_eq!(log.iter().filter(|e| *e == "Address::init").count(), 1);
            assert_eq!(log.iter().filter(|e| *e == "Bob::init").count(), 1);
            assert_eq!(log.iter().filter(|e| *e == "Address::install").count(), 2);
        }

        #[test]
        fn test_uninstall_dependents_first() {
            let mut manager = FixtureManager::new();
            manager.set("address", Address::default()).unwrap();
            manager.set("bob", Bob::default()).unwrap();
            manager.install().unwrap();
            take_log();

            manager.uninstall().unwrap();

            assert_eq!(take_log(), vec!["Bob::uninstall", "Address::uninstall"]);
            assert_eq!(manager.state("address").unwrap(), FixtureState::Uninstalled);
        }

        #[test]
        fn test_mutual_cycle_fails_before_hooks() {
            let mut manager = FixtureManager::new();
            manager.set("ping", Ping).unwrap();
            let err = manager.install().unwrap_err();
            assert_eq!(
                err,
                FixtureError::Cycle {
                    path: vec!["Ping".into(), "Pong".into(), "Ping".into()]
                }
            );
            assert_eq!(manager.state("ping").unwrap(), FixtureState::Uninitialized);
        }

        #[test]
        fn test_self_dependency_is_cycle() {
            let mut manager = FixtureManager::new();
            let err = manager.set("me", Narcissus).unwrap_err();
            assert!(matches!(err, FixtureError::Cycle { .. }));
        }

        #[test]
        fn test_strict_policy_propagates_hook_error() {
            let mut manager = FixtureManager::new();
            manager.set("broken", Broken).unwrap();
            let err = manager.install().unwrap_err();
            assert_eq!(
                err,
                FixtureError::Hook {
                    fixture: "Broken".to_string(),
                    hook: HookMethod::Install,
                    message: "database unavailable".to_string(),
                }
            );
        }

        #[test]
        fn test_lenient_policy_logs_and_continues() {
            let mut manager = FixtureManager::with_policy(HookPolicy::Lenient);
            manager.set("broken", Broken).unwrap();
            manager.set("panicky", Panicky).unwrap();
            manager.set("address", Address::default()).unwrap();
            manager.install().unwrap();

            let keys: Vec<_> = manager.errors().iter().map(HookFailure::key).collect();
            assert_eq!(keys, vec!["Broken::install", "Panicky::init"]);
            assert_eq!(manager.errors()[1].message, "init exploded");
            assert_eq!(manager.state("broken").unwrap(), FixtureState::Failed);
            assert_eq!(manager.state("address").unwrap(), FixtureState::Installed);
            // The fixture survives its own panicking hook.
            assert!(manager.get("panicky").is_ok());
        }

        #[test]
        fn test_dependency_tree() {
            let mut manager = FixtureManager::new();
            manager.set("bob", Bob::default()).unwrap();

            let before = manager.dependency_tree();
            assert_eq!(before.len(), 1);
            assert_eq!(before[0].dependencies[0].state, None);

            manager.resolve().unwrap();
            let after = manager.dependency_tree();
            assert_eq!(after.len(), 2);
            assert_eq!(after[0].name, "bob");
            assert_eq!(after[0].dependencies[0].name, "Address");
            assert_eq!(
                after[0].dependencies[0].state,
                Some(FixtureState::Uninitialized)
            );
        }

        #[test]
        fn test_hook_policy_from_str() {
            assert_eq!("Lenient".parse::<HookPolicy>().unwrap(), HookPolicy::Lenient);
            assert_eq!("strict".parse::<HookPolicy>().unwrap(), HookPolicy::Strict);
            assert!("sloppy".parse::<HookPolicy>().is_err());
        }
    }
}
