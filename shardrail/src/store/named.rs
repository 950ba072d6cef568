//! Named update statements.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::Value;

/// A pre-declared update statement referenced by name, with a parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuery {
    name: String,
    params: IndexMap<String, Value>,
}

impl NamedQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: IndexMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &IndexMap<String, Value> {
        &self.params
    }
}
