use std::collections::BTreeMap;
use std::time::Duration;

use hdt_core::expand::ConcreteApi;
use hdt_core::vars::subst::{resolve_json, resolve_str};
use hdt_core::vars::Environment;

use super::http::HttpRequest;
use super::result::ExecError;
use super::types::ExecutorConfig;

/// Substitute the environment into a request template. The path resolves to
/// an absolute URL because expansion prefixed it with the virtual host's
/// `${host_variable}`.
pub(crate) fn build_request(
    api: &ConcreteApi,
    env: &Environment,
) -> Result<HttpRequest, ExecError> {
    let url = resolve_str(&api.request.path, env)?;

    let mut headers = BTreeMap::new();
    for (k, v) in &api.request.headers {
        headers.insert(resolve_str(k, env)?, resolve_str(v, env)?);
    }

    let basic_auth = match &api.request.auth {
        Some(auth) => Some((resolve_str(&auth.user, env)?, resolve_str(&auth.pass, env)?)),
        None => None,
    };

    let body = match &api.request.body {
        Some(body) => Some(resolve_json(body, env)?),
        None => None,
    };

    Ok(HttpRequest {
        method: api.request.method.clone(),
        url,
        headers,
        body,
        basic_auth,
    })
}

pub(crate) fn timeout_for(api: &ConcreteApi, config: &ExecutorConfig) -> Duration {
    api.request
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(config.timeout)
}

/// Queue key for per-resource serialization: `name=value` per serial
/// variable, comma-joined. Missing values are fatal.
pub(crate) fn queue_key(api: &ConcreteApi, env: &Environment) -> Result<Option<String>, ExecError> {
    if api.serial_vars.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(api.serial_vars.len());
    for name in &api.serial_vars {
        let value = env
            .get(name)
            .ok_or_else(|| ExecError::MissingSerialVar(name.clone()))?;
        let text = value
            .as_text()
            .map_err(|_| ExecError::MissingSerialVar(name.clone()))?;
        parts.push(format!("{name}={text}"));
    }
    Ok(Some(parts.join(",")))
}
