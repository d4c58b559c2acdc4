use std::collections::BTreeSet;
use std::path::Path;

use hdt_core::vars::{resolve_catalog, EnvValue, Environment};
use hdt_core::LoadedProject;
use serde_json::Value as JsonValue;

/// Build the run environment: catalogue values first, `--config` files next,
/// `--var` pairs last.
pub fn build_environment(
    project: &LoadedProject,
    config_files: &[std::path::PathBuf],
    var_pairs: &[String],
) -> Result<Environment, String> {
    let mut env = resolve_catalog(&project.catalog).map_err(|e| e.to_string())?;

    for path in config_files {
        overlay_config(&mut env, path)?;
    }

    for pair in var_pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("--var {pair:?} is not NAME=VALUE"));
        };
        env.set(name.to_string(), JsonValue::String(value.to_string()));
    }

    Ok(env)
}

fn overlay_config(env: &mut Environment, path: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    let parsed: JsonValue =
        serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))?;
    let JsonValue::Object(map) = parsed else {
        return Err(format!(
            "{}: config file must be a flat JSON object",
            path.display()
        ));
    };
    for (name, value) in map {
        match value {
            JsonValue::Array(items) => env.set(name, EnvValue::Many(items)),
            other => env.set(name, other),
        }
    }
    Ok(())
}

/// The planner's predefined set: everything present in the environment at
/// run start.
pub fn predefined_names(env: &Environment) -> BTreeSet<String> {
    env.names().map(str::to_string).collect()
}
