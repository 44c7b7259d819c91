//! Map-like data carried by a fixture.

use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use serde_json::Value;

static EMPTY: FixtureData = FixtureData::new();
static NULL: Value = Value::Null;

/// String-keyed bag of JSON values.
///
/// Reading a key that was never set yields `Value::Null` instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureData {
    values: BTreeMap<String, Value>,
}

impl FixtureData {
    pub const fn new() -> Self {
        FixtureData {
            values: BTreeMap::new(),
        }
    }

    /// Shared empty data, returned by fixtures that carry none.
    pub fn empty() -> &'static FixtureData {
        &EMPTY
    }

    pub fn get(&self, key: &str) -> &Value {
        self.values.get(key).unwrap_or(&NULL)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Index<&str> for FixtureData {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FixtureData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FixtureData {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
