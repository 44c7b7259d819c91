//! Given/when/then stories on top of test units.
//!
//! A story case registers its steps by description. A test method then
//! drives the steps in order; each call looks up the step registered under
//! the same normalized description.
//!
//! ```ignore
//! impl StoryCase for Checkout {
//!     fn steps(table: &mut StepTable<Self>) {
//!         table
//!             .given("a cart with items", Self::cart_with_items)
//!             .when("the user checks out", Self::checks_out)
//!             .then("the cart is empty", Self::cart_is_empty);
//!     }
//! }
//!
//! fn buying(&mut self, ctx: &mut UnitContext) -> anyhow::Result<()> {
//!     Story::begin(self, ctx)
//!         .given("a cart with items", &[json!(3)])?
//!         .when("the user checks out", &[])?
//!         .then("the cart is empty", &[])?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::names::normalize_description;
use crate::unit::{TestCase, UnitContext};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    /// No step is registered for the description.
    #[error("no step defined for \"{key}\" ({kind} \"{description}\")")]
    UndefinedStep {
        kind: StepKind,
        description: String,
        key: String,
    },
}

pub type StoryResult<T> = Result<T, StoryError>;

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepKind {
    Given,
    When,
    Then,
}

impl StepKind {
    fn prefix(self) -> &'static str {
        match self {
            StepKind::Given => "given",
            StepKind::When => "when",
            StepKind::Then => "then",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A story step: receives the case, the unit context and the step arguments.
pub type StepFn<T> = fn(&mut T, &mut UnitContext, &[Value]) -> anyhow::Result<()>;

/// Lookup key for a step: the kind followed by the normalized description.
pub fn step_key(kind: StepKind, description: &str) -> String {
    format!("{}{}", kind.prefix(), normalize_description(description))
}

/// Steps of a story case, keyed by [`step_key`].
pub struct StepTable<T> {
    steps: BTreeMap<String, StepFn<T>>,
}

impl<T> Default for StepTable<T> {
    fn default() -> Self {
        StepTable {
            steps: BTreeMap::new(),
        }
    }
}

impl<T> StepTable<T> {
    pub fn new() -> Self {
        StepTable::default()
    }

    pub fn add(&mut self, kind: StepKind, description: &str, step: StepFn<T>) -> &mut Self {
        self.steps.insert(step_key(kind, description), step);
        self
    }

    pub fn given(&mut self, description: &str, step: StepFn<T>) -> &mut Self {
        self.add(StepKind::Given, description, step)
    }

    pub fn when(&mut self, description: &str, step: StepFn<T>) -> &mut Self {
        self.add(StepKind::When, description, step)
    }

    pub fn then(&mut self, description: &str, step: StepFn<T>) -> &mut Self {
        self.add(StepKind::Then, description, step)
    }

    pub fn get(&self, kind: StepKind, description: &str) -> StoryResult<StepFn<T>> {
        let key = step_key(kind, description);
        self.steps
            .get(&key)
            .copied()
            .ok_or_else(|| StoryError::UndefinedStep {
                kind,
                description: description.to_string(),
                key,
            })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A test case that defines story steps.
pub trait StoryCase: TestCase {
    fn steps(table: &mut StepTable<Self>);
}

// ============================================================================
// Story Driver
// ============================================================================

/// Drives the steps of one story inside a test method.
pub struct Story<'a, T: StoryCase> {
    case: &'a mut T,
    ctx: &'a mut UnitContext,
    steps: StepTable<T>,
}

impl<'a, T: StoryCase> Story<'a, T> {
    pub fn begin(case: &'a mut T, ctx: &'a mut UnitContext) -> Self {
        let mut steps = StepTable::new();
        T::steps(&mut steps);
        Story { case, ctx, steps }
    }

    /// Describe the subject.
    pub fn given(self, description: &str, args: &[Value]) -> anyhow::Result<Self> {
        self.step(StepKind::Given, description, args)
    }

    /// Describe a change to the subject.
    pub fn when(self, description: &str, args: &[Value]) -> anyhow::Result<Self> {
        self.step(StepKind::When, description, args)
    }

    /// Describe the expected outcome.
    pub fn then(self, description: &str, args: &[Value]) -> anyhow::Result<Self> {
        self.step(StepKind::Then, description, args)
    }

    fn step(mut self, kind: StepKind, description: &str, args: &[Value]) -> anyhow::Result<Self> {
        let step = self.steps.get(kind, description)?;
        trace!(kind = %kind, description, "running story step");
        step(&mut *self.case, &mut *self.ctx, args)?;
        Ok(self)
    }
}
