//! Integration tests for fixture dependency resolution and lifecycle order.

use std::cell::RefCell;

use serde_json::json;
use testes::fixture::{
    Dependencies, Dependency, Fixture, FixtureData, FixtureError, FixtureManager, FixtureState,
    HookMethod, HookPolicy, HookResult,
};

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: &str) {
    JOURNAL.with(|j| j.borrow_mut().push(entry.to_string()));
}

fn journal() -> Vec<String> {
    JOURNAL.with(|j| j.borrow().clone())
}

// ============================================================================
// Fixtures
// ============================================================================

/// Leaf fixture holding connection settings.
#[derive(Default)]
struct Database {
    data: FixtureData,
}

impl Fixture for Database {
    fn init(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Database::init");
        self.data.set("dsn", json!("memory://"));
        Ok(())
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Database::install");
        Ok(())
    }

    fn uninstall(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Database::uninstall");
        Ok(())
    }

    fn data(&self) -> &FixtureData {
        &self.data
    }
}

/// Depends on Database.
#[derive(Default)]
struct Users {
    data: FixtureData,
}

impl Fixture for Users {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Database>()]
    }

    fn init(&mut self, deps: &Dependencies<'_>) -> HookResult {
        log("Users::init");
        let db = deps.get::<Database>()?;
        self.data.set("dsn", db.data()["dsn"].clone());
        self.data.set("name", json!("bob"));
        Ok(())
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Users::install");
        Ok(())
    }

    fn uninstall(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Users::uninstall");
        Ok(())
    }

    fn data(&self) -> &FixtureData {
        &self.data
    }
}

/// Also depends on Database.
#[derive(Default)]
struct Orders;

impl Fixture for Orders {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Database>(), Dependency::on::<Users>()]
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Orders::install");
        Ok(())
    }

    fn uninstall(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Orders::uninstall");
        Ok(())
    }
}

#[derive(Default)]
struct Chicken;

impl Fixture for Chicken {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Egg>()]
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Chicken::install");
        Ok(())
    }
}

#[derive(Default)]
struct Egg;

impl Fixture for Egg {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Chicken>()]
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Egg::install");
        Ok(())
    }
}

#[derive(Default)]
struct Flaky;

impl Fixture for Flaky {
    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        anyhow::bail!("seed file missing")
    }
}

/// Depends on a fixture whose install always fails.
#[derive(Default)]
struct Seeded;

impl Fixture for Seeded {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Flaky>()]
    }

    fn init(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Seeded::init");
        Ok(())
    }

    fn install(&mut self, _deps: &Dependencies<'_>) -> HookResult {
        log("Seeded::install");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_dependency_installed_first() {
    let mut manager = FixtureManager::new();
    manager.set("users", Users::default()).unwrap();
    manager.install().unwrap();

    assert_eq!(
        journal(),
        vec!["Database::init", "Database::install", "Users::init", "Users::install"]
    );
    assert!(manager.has("Database"));
    assert_eq!(manager.state("users").unwrap(), FixtureState::Installed);
    assert_eq!(manager.state("Database").unwrap(), FixtureState::Installed);

    let users = manager.get("users").unwrap();
    assert_eq!(users.data()["dsn"], json!("memory://"));
    assert!(users.data()["missing"].is_null());
}

#[test]
fn test_shared_dependency_initialized_once() {
    let mut manager = FixtureManager::new();
    manager
        .set("orders", Orders)
        .unwrap()
        .set("users", Users::default())
        .unwrap();
    manager.install().unwrap();
    manager.install().unwrap();

    let entries = journal();
    let count = |entry: &str| entries.iter().filter(|e| *e == entry).count();
    assert_eq!(count("Database::init"), 1);
    assert_eq!(count("Database::install"), 1);
    assert_eq!(count("Users::init"), 1);
    assert_eq!(count("Orders::install"), 1);
    assert_eq!(manager.count(), 3);
}

#[test]
fn test_uninstall_dependents_first() {
    let mut manager = FixtureManager::new();
    manager.set("db", Database::default()).unwrap();
    manager.set("orders", Orders).unwrap();
    manager.install().unwrap();
    JOURNAL.with(|j| j.borrow_mut().clear());

    manager.uninstall().unwrap();
    assert_eq!(
        journal(),
        vec!["Orders::uninstall", "Users::uninstall", "Database::uninstall"]
    );
    assert_eq!(manager.state("db").unwrap(), FixtureState::Uninstalled);
}

#[test]
fn test_same_type_under_two_names() {
    let mut manager = FixtureManager::new();
    manager.set("primary", Database::default()).unwrap();
    manager.set("replica", Database::default()).unwrap();

    assert_eq!(manager.count(), 1);
    assert_eq!(manager.names(), vec!["primary", "replica"]);
    manager.install().unwrap();
    assert_eq!(journal().iter().filter(|e| *e == "Database::init").count(), 1);
    assert_eq!(manager.state("replica").unwrap(), FixtureState::Installed);
}

#[test]
fn test_cycle_fails_before_any_hook() {
    let mut manager = FixtureManager::new();
    manager.set("chicken", Chicken).unwrap();

    let err = manager.install().unwrap_err();
    match err {
        FixtureError::Cycle { path } => {
            assert_eq!(path, vec!["Chicken", "Egg", "Chicken"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert!(journal().is_empty());
}

#[test]
fn test_unknown_name_not_found() {
    let manager = FixtureManager::new();
    assert!(matches!(
        manager.get("ghost"),
        Err(FixtureError::NotFound { .. })
    ));
}

#[test]
fn test_strict_policy_propagates_hook_failure() {
    let mut manager = FixtureManager::new();
    manager.set("flaky", Flaky).unwrap();

    let err = manager.install().unwrap_err();
    assert!(matches!(
        err,
        FixtureError::Hook {
            hook: HookMethod::Install,
            ..
        }
    ));
    assert!(err.to_string().contains("seed file missing"));
}

#[test]
fn test_lenient_policy_logs_and_continues() {
    let mut manager = FixtureManager::with_policy(HookPolicy::Lenient);
    manager.set("flaky", Flaky).unwrap();
    manager.set("db", Database::default()).unwrap();

    manager.install().unwrap();
    assert_eq!(manager.state("flaky").unwrap(), FixtureState::Failed);
    assert_eq!(manager.state("db").unwrap(), FixtureState::Installed);

    let errors = manager.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].key(), "Flaky::install");
}

#[test]
fn test_dependency_tree_serializes() {
    let mut manager = FixtureManager::new();
    manager.set("users", Users::default()).unwrap();
    manager.resolve().unwrap();

    let tree = manager.dependency_tree();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].name, "users");
    assert_eq!(tree[0].dependencies[0].name, "Database");

    let value = serde_json::to_value(&tree).unwrap();
    assert_eq!(value[0]["dependencies"][0]["state"], json!("uninitialized"));
}

#[test]
fn test_lenient_policy_skips_dependents_of_failed_fixture() {
    let mut manager = FixtureManager::with_policy(HookPolicy::Lenient);
    manager.set("seeded", Seeded).unwrap();

    manager.install().unwrap();
    assert_eq!(manager.state("Flaky").unwrap(), FixtureState::Failed);
    assert_eq!(manager.state("seeded").unwrap(), FixtureState::Failed);
    assert!(journal().is_empty());

    let keys: Vec<_> = manager.errors().iter().map(|e| e.key()).collect();
    assert_eq!(keys, vec!["Flaky::install", "Seeded::install"]);
    assert_eq!(manager.errors()[1].message, "dependency Flaky failed");

    manager.uninstall().unwrap();
    assert!(journal().is_empty());
}
