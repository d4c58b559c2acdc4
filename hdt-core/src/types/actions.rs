use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::paths::DataPath;

/// A user-supplied extractor over the parsed response body.
pub type ExtractFn = Arc<dyn Fn(&JsonValue) -> Result<JsonValue, String> + Send + Sync>;

/// Where a `var_set`/`var_new` assignment takes its value from.
#[derive(Clone)]
pub enum ValueSource {
    /// Extract from the response body at this path.
    Path(DataPath),
    /// Textually resolve this value against the environment.
    Value(JsonValue),
    /// Compute from the response body.
    Fcn(ExtractFn),
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Path(p) => write!(f, "Path({p})"),
            ValueSource::Value(v) => write!(f, "Value({v})"),
            ValueSource::Fcn(_) => f.write_str("Fcn(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarSet {
    pub name: String,
    pub source: ValueSource,
}

/// Constructor link: assigns like `var_set` and ties the API to its getter
/// and destructor peers.
#[derive(Debug, Clone)]
pub struct VarNew {
    pub name: String,
    pub source: ValueSource,
    pub get: String,
    pub delete: String,
    /// Variable names whose values key the serialization queue.
    pub serial_vars: Vec<String>,
}

/// A response-time environment mutation, applied in scanning order.
#[derive(Debug, Clone)]
pub enum Action {
    Set(VarSet),
    New(VarNew),
    Rename { from: String, to: String },
    Delete(String),
}

impl Action {
    /// Variable names this action adds to the environment.
    pub fn produced(&self) -> Option<&str> {
        match self {
            Action::Set(s) => Some(&s.name),
            Action::New(n) => Some(&n.name),
            Action::Rename { to, .. } => Some(to),
            Action::Delete(_) => None,
        }
    }

    /// Variable names this action removes from the environment.
    pub fn deleted(&self) -> Option<&str> {
        match self {
            Action::Rename { from, .. } => Some(from),
            Action::Delete(name) => Some(name),
            _ => None,
        }
    }
}
