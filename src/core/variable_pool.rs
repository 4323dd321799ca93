use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::resolve_text;

/// Ordered name → value map visible to templates, conditions and processors.
///
/// Every virtual user owns its own clone; nothing here is shared or locked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableEnvironment {
    vars: Map<String, Value>,
}

impl VariableEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: Map<String, Value>) -> Self {
        Self { vars }
    }

    /// Build from a JSON object. Any other value yields an empty environment.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(vars) => Self { vars },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Overlay `other`, overwriting existing keys.
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (k, v) in other {
            self.vars.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.vars
    }

    pub fn resolve_template(&self, text: &str) -> String {
        resolve_text(text, self)
    }
}

impl FromIterator<(String, Value)> for VariableEnvironment {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
