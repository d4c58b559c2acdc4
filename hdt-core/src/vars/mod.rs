pub mod catalog;
pub mod subst;

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

pub use catalog::resolve_catalog;
pub use subst::SubstError;

/// A runtime variable value: a single JSON value, or a multi-valued
/// enumeration awaiting combination expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    One(JsonValue),
    Many(Vec<JsonValue>),
}

impl EnvValue {
    /// Textual form used by substitution. Enumerations have no textual form
    /// until a combination pins them to a single candidate.
    pub fn as_text(&self) -> Result<String, SubstError> {
        match self {
            EnvValue::One(JsonValue::String(s)) => Ok(s.clone()),
            EnvValue::One(other) => Ok(other.to_string()),
            EnvValue::Many(_) => Err(SubstError::UnresolvedEnumeration),
        }
    }
}

impl From<JsonValue> for EnvValue {
    fn from(v: JsonValue) -> Self {
        EnvValue::One(v)
    }
}

/// The variable environment. One logical environment flows down the
/// execution tree; sibling subtrees get independent clones so writes on one
/// branch never leak to another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, EnvValue>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.vars.get(name)
    }

    /// The single value of a variable, if it has one.
    pub fn get_one(&self, name: &str) -> Option<&JsonValue> {
        match self.vars.get(name) {
            Some(EnvValue::One(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<EnvValue>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<EnvValue> {
        self.vars.remove(name)
    }

    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.vars.remove(from) {
            Some(v) => {
                self.vars.insert(to.into(), v);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, EnvValue)> for Environment {
    fn from_iter<T: IntoIterator<Item = (String, EnvValue)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
