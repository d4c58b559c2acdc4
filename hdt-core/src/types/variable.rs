use std::collections::BTreeMap;

use serde::de::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use crate::vars::subst::contains_ref;

/// The declared variable catalogue, keyed by variable name.
pub type Catalog = BTreeMap<String, VarDecl>;

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub descr: String,
    pub value: Option<VarValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Scalar(JsonValue),
    /// Enumeration: candidate values exploded by the planner.
    OneOf(Vec<JsonValue>),
    /// Textual template referencing other variables.
    Template(String),
    /// Base64 encoding of a template, computed at load time.
    Base64(String),
}

impl VarDecl {
    pub fn described(descr: impl Into<String>) -> Self {
        Self {
            descr: descr.into(),
            value: None,
        }
    }

    pub fn with_value(descr: impl Into<String>, value: JsonValue) -> Self {
        Self {
            descr: descr.into(),
            value: Some(classify_value(value)),
        }
    }
}

fn classify_value(value: JsonValue) -> VarValue {
    match value {
        JsonValue::Array(items) => VarValue::OneOf(items),
        JsonValue::String(s) if contains_ref(&s) => VarValue::Template(s),
        other => VarValue::Scalar(other),
    }
}

impl<'de> Deserialize<'de> for VarDecl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            // `name: "a description"` shorthand.
            Descr(String),
            Full {
                descr: String,
                #[serde(default)]
                value: Option<JsonValue>,
                #[serde(default)]
                base64: Option<String>,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Descr(descr) => VarDecl::described(descr),
            Repr::Full {
                descr,
                value,
                base64,
            } => {
                let value = match (base64, value) {
                    (Some(template), _) => Some(VarValue::Base64(template)),
                    (None, Some(v)) => Some(classify_value(v)),
                    (None, None) => None,
                };
                VarDecl { descr, value }
            }
        })
    }
}
