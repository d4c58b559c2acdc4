use hdt_core::expand::ConcreteApi;
use hdt_core::types::{Action, ValueSource};
use hdt_core::vars::subst::resolve_json;
use hdt_core::vars::{EnvValue, Environment};
use serde_json::Value as JsonValue;

use super::result::ExecError;

/// Apply the API's declared actions to the environment, in scanning order.
pub(crate) fn apply_actions(
    api: &ConcreteApi,
    body: Option<&JsonValue>,
    env: &mut Environment,
) -> Result<(), ExecError> {
    for action in &api.actions {
        match action {
            Action::Set(set) => assign(&set.name, &set.source, body, env)?,
            Action::New(var_new) => assign(&var_new.name, &var_new.source, body, env)?,
            Action::Rename { from, to } => {
                if !env.rename(from, to.clone()) {
                    return Err(ExecError::Action(format!(
                        "var_rename: {from} is not in the environment"
                    )));
                }
            }
            Action::Delete(name) => {
                env.remove(name);
            }
        }
    }
    Ok(())
}

fn assign(
    name: &str,
    source: &ValueSource,
    body: Option<&JsonValue>,
    env: &mut Environment,
) -> Result<(), ExecError> {
    let value = match source {
        ValueSource::Path(path) => {
            let body = body.ok_or_else(|| {
                ExecError::Action(format!(
                    "cannot extract {name}: response has no JSON body"
                ))
            })?;
            let extracted = path.extract(body)?;
            // `[]` extractions become enumerations so downstream consumers
            // fan out over the collected values.
            if path.is_multi() {
                let items = extracted
                    .as_array()
                    .cloned()
                    .unwrap_or_else(|| vec![extracted.clone()]);
                env.set(name.to_string(), EnvValue::Many(items));
                return Ok(());
            }
            extracted
        }
        ValueSource::Value(template) => resolve_json(template, env)?,
        ValueSource::Fcn(f) => {
            let body = body.cloned().unwrap_or(JsonValue::Null);
            f(&body).map_err(ExecError::Action)?
        }
    };
    env.set(name.to_string(), value);
    Ok(())
}
