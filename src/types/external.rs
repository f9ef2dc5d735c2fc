use std::collections::HashMap;

use super::value::{Value, NULL};

/// One row of a reference list (a crop type, a barrack, a worker).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field access with `Null` for anything missing.
    #[must_use]
    pub fn value(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }
}

/// Named read-only reference lists injected per form instance.
///
/// Populated by the host page before the form opens and refreshed only by
/// the host; rule evaluation copies out of these lists and never writes
/// into them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ExternalData {
    lists: HashMap<String, Vec<Record>>,
}

impl ExternalData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named list, builder style.
    #[must_use]
    pub fn list(mut self, key: &str, records: Vec<Record>) -> Self {
        self.lists.insert(key.to_owned(), records);
        self
    }

    /// Fold another data set in. Lists under the same key are replaced,
    /// matching how a host page refreshes reference data.
    pub fn merge(&mut self, other: ExternalData) {
        self.lists.extend(other.lists);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Record]> {
        self.lists.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lists.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }
}
