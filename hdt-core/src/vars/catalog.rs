use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value as JsonValue;

use crate::error::LoadError;
use crate::types::{Catalog, VarValue};

use super::subst::{contains_ref, first_ref, partial_str, MAX_PASSES};
use super::{EnvValue, Environment};

/// Materialise the catalogue into a runtime environment: scalars and
/// enumerations verbatim, templates resolved to a textual fixed point,
/// base64 values computed. References to names outside the catalogue stay
/// symbolic (they resolve at runtime); references among catalogue values
/// that never converge are a fatal load error.
pub fn resolve_catalog(catalog: &Catalog) -> Result<Environment, LoadError> {
    let mut env = Environment::new();
    let mut base64_vars = Vec::new();

    for (name, decl) in catalog {
        match &decl.value {
            None => {}
            Some(VarValue::Scalar(v)) => env.set(name.clone(), v.clone()),
            Some(VarValue::OneOf(items)) => {
                env.set(name.clone(), EnvValue::Many(items.clone()));
            }
            Some(VarValue::Template(t)) => {
                env.set(name.clone(), JsonValue::String(t.clone()));
            }
            Some(VarValue::Base64(t)) => base64_vars.push((name.clone(), t.clone())),
        }
    }

    fixed_point(&mut env)?;

    for (name, template) in base64_vars {
        // Base64 values are computed once at load, so every reference must
        // resolve here; the environment is already at its fixed point.
        let resolved = partial_str(&template, &env);
        if contains_ref(&resolved) {
            let reference = first_ref(&resolved).unwrap_or_default();
            return Err(LoadError::UndefinedVariable { name, reference });
        }
        env.set(name, JsonValue::String(BASE64.encode(resolved)));
    }

    Ok(env)
}

fn fixed_point(env: &mut Environment) -> Result<(), LoadError> {
    let names: Vec<String> = env.names().map(str::to_string).collect();
    let mut last_changed = None;

    for _ in 0..MAX_PASSES {
        let mut changed = false;
        for name in &names {
            let Some(value) = env.get(name).cloned() else {
                continue;
            };
            let next = resolve_env_value(&value, env);
            if next != value {
                changed = true;
                last_changed = Some(name.clone());
                env.set(name.clone(), next);
            }
        }
        if !changed {
            // Converged textually; any surviving reference to a resolved
            // catalogue value means the chain feeds itself.
            for name in &names {
                if let Some(EnvValue::One(JsonValue::String(s))) = env.get(name) {
                    if references_resolved_value(s, env) {
                        return Err(LoadError::CyclicVariable {
                            name: name.clone(),
                            rounds: MAX_PASSES,
                        });
                    }
                }
            }
            return Ok(());
        }
    }

    Err(LoadError::CyclicVariable {
        name: last_changed.unwrap_or_default(),
        rounds: MAX_PASSES,
    })
}

fn resolve_env_value(value: &EnvValue, env: &Environment) -> EnvValue {
    match value {
        EnvValue::One(JsonValue::String(s)) => {
            EnvValue::One(JsonValue::String(partial_str(s, env)))
        }
        EnvValue::Many(items) => EnvValue::Many(
            items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => JsonValue::String(partial_str(s, env)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn references_resolved_value(s: &str, env: &Environment) -> bool {
    let mut refs = Vec::new();
    super::subst::scan_refs(s, &mut refs);
    refs.iter()
        .any(|name| matches!(env.get(name), Some(EnvValue::One(_))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VarDecl;
    use serde_json::json;

    fn decl(descr: &str, value: JsonValue) -> VarDecl {
        VarDecl::with_value(descr, value)
    }

    #[test]
    fn resolves_templates_to_fixed_point() {
        let mut catalog = Catalog::new();
        catalog.insert("host".into(), decl("host", json!("https://api.test")));
        catalog.insert("tokenUrl".into(), decl("url", json!("$host/oauth")));
        let env = resolve_catalog(&catalog).unwrap();
        assert_eq!(
            env.get_one("tokenUrl"),
            Some(&json!("https://api.test/oauth"))
        );
    }

    #[test]
    fn keeps_runtime_references_symbolic() {
        let mut catalog = Catalog::new();
        catalog.insert("whoUrl".into(), decl("url", json!("$host/me/$token")));
        catalog.insert("host".into(), decl("host", json!("h")));
        let env = resolve_catalog(&catalog).unwrap();
        assert_eq!(env.get_one("whoUrl"), Some(&json!("h/me/$token")));
    }

    #[test]
    fn detects_cycles() {
        let mut catalog = Catalog::new();
        catalog.insert("a".into(), decl("a", json!("$b")));
        catalog.insert("b".into(), decl("b", json!("x$a")));
        assert!(matches!(
            resolve_catalog(&catalog),
            Err(LoadError::CyclicVariable { .. })
        ));
    }

    #[test]
    fn detects_self_reference() {
        let mut catalog = Catalog::new();
        catalog.insert("a".into(), decl("a", json!("$a")));
        assert!(matches!(
            resolve_catalog(&catalog),
            Err(LoadError::CyclicVariable { .. })
        ));
    }

    #[test]
    fn computes_base64_values() {
        let mut catalog = Catalog::new();
        catalog.insert("id".into(), decl("id", json!("u")));
        catalog.insert("secret".into(), decl("secret", json!("p")));
        catalog.insert(
            "cred".into(),
            VarDecl {
                descr: "cred".into(),
                value: Some(VarValue::Base64("$id:$secret".into())),
            },
        );
        let env = resolve_catalog(&catalog).unwrap();
        assert_eq!(env.get_one("cred"), Some(&json!("dTpw")));
    }

    #[test]
    fn base64_with_unresolved_reference_fails() {
        let mut catalog = Catalog::new();
        catalog.insert(
            "cred".into(),
            VarDecl {
                descr: "cred".into(),
                value: Some(VarValue::Base64("$runtimeOnly".into())),
            },
        );
        assert!(matches!(
            resolve_catalog(&catalog),
            Err(LoadError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn enumerations_stay_multi_valued() {
        let mut catalog = Catalog::new();
        catalog.insert("grant".into(), decl("grant", json!(["a", "b"])));
        let env = resolve_catalog(&catalog).unwrap();
        assert_eq!(
            env.get("grant"),
            Some(&EnvValue::Many(vec![json!("a"), json!("b")]))
        );
    }
}
