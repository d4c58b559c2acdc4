use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value as JsonValue;

use super::Environment;

/// `$name` or `${name}`.
static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid regex")
});

/// Substitution stops changing text after this many passes, or the input is
/// declared cyclic.
pub const MAX_PASSES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstError {
    #[error("variable {0} is not defined")]
    Undefined(String),
    #[error("substitution did not converge after {MAX_PASSES} passes")]
    NoConvergence,
    #[error("enumerated variable used before combination expansion")]
    UnresolvedEnumeration,
}

/// Whether the string contains at least one variable reference.
pub fn contains_ref(s: &str) -> bool {
    VAR_RE.is_match(s)
}

/// All referenced variable names, in order of first appearance.
pub fn scan_refs(s: &str, out: &mut Vec<String>) {
    for cap in VAR_RE.captures_iter(s) {
        let name = cap_name(&cap);
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
}

fn cap_name<'a>(cap: &'a Captures<'_>) -> &'a str {
    cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()).unwrap_or_default()
}

/// One substitution pass that only replaces references with a single
/// resolved value; unknown and enumerated references are left untouched.
/// Used for load-time catalogue resolution and expansion-time grounding of
/// test overrides and enumeration candidates.
pub fn partial_str(input: &str, env: &Environment) -> String {
    VAR_RE
        .replace_all(input, |cap: &Captures<'_>| {
            let name = cap_name(cap);
            match env.get(name) {
                Some(super::EnvValue::One(JsonValue::String(s))) => s.clone(),
                Some(super::EnvValue::One(other)) => other.to_string(),
                _ => cap[0].to_string(),
            }
        })
        .into_owned()
}

/// Apply [`partial_str`] to keys and values of every string in a JSON tree.
pub fn partial_json(value: &JsonValue, env: &Environment) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(partial_str(s, env)),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| partial_json(item, env)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (partial_str(k, env), partial_json(v, env)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The first variable reference in the string, if any.
pub fn first_ref(s: &str) -> Option<String> {
    VAR_RE.captures(s).map(|cap| cap_name(&cap).to_string())
}

fn subst_pass(input: &str, env: &Environment) -> Result<String, SubstError> {
    let mut err = None;
    let out = VAR_RE.replace_all(input, |cap: &Captures<'_>| {
        let name = cap_name(cap);
        match env.get(name).map(|v| v.as_text()) {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                err.get_or_insert(e);
                String::new()
            }
            None => {
                err.get_or_insert(SubstError::Undefined(name.to_string()));
                String::new()
            }
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

/// Replace `$name`/`${name}` references until a fixed point, bounded by
/// [`MAX_PASSES`]. Missing variables are fatal.
pub fn resolve_str(input: &str, env: &Environment) -> Result<String, SubstError> {
    let mut cur = input.to_string();
    for _ in 0..MAX_PASSES {
        let next = subst_pass(&cur, env)?;
        if next == cur {
            return Ok(cur);
        }
        cur = next;
    }
    Err(SubstError::NoConvergence)
}

/// Apply [`resolve_str`] to the keys and values of every string in a JSON
/// tree.
pub fn resolve_json(value: &JsonValue, env: &Environment) -> Result<JsonValue, SubstError> {
    match value {
        JsonValue::String(s) => Ok(JsonValue::String(resolve_str(s, env)?)),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_json(item, env)?);
            }
            Ok(JsonValue::Array(out))
        }
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(resolve_str(k, env)?, resolve_json(v, env)?);
            }
            Ok(JsonValue::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Collect every variable name referenced anywhere in a JSON tree, in
/// depth-first first-appearance order.
pub fn scan_json_refs(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::String(s) => scan_refs(s, out),
        JsonValue::Array(items) => {
            for item in items {
                scan_json_refs(item, out);
            }
        }
        JsonValue::Object(map) => {
            for (k, v) in map {
                scan_refs(k, out);
                scan_json_refs(v, out);
            }
        }
        _ => {}
    }
}
