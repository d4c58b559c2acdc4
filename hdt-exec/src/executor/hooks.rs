use std::sync::Arc;
use std::time::Duration;

use hdt_core::types::{BoxFuture, Hook, HookCtx, HookFn};
use hdt_core::vars::subst::resolve_json;
use hdt_core::vars::Environment;
use serde_json::{json, Value as JsonValue};

use super::actions::apply_actions;
use super::http::{HttpClient, HttpRequest};
use super::request::{build_request, timeout_for};
use super::result::ExecError;
use super::runner::Shared;
use super::validate::validate_response;

/// The context handed to user hook functions: direct environment access,
/// the chain break flag, and ad-hoc HTTP through the run's client.
pub(crate) struct ExecHookCtx<'a> {
    pub env: &'a mut Environment,
    pub brk: &'a mut bool,
    pub http: Arc<dyn HttpClient>,
    pub timeout: Duration,
}

impl HookCtx for ExecHookCtx<'_> {
    fn get_var(&self, name: &str) -> Option<JsonValue> {
        self.env.get_one(name).cloned()
    }

    fn set_var(&mut self, name: &str, value: JsonValue) {
        self.env.set(name.to_string(), value);
    }

    fn is_break(&self) -> bool {
        *self.brk
    }

    fn set_break(&mut self, brk: bool) {
        *self.brk = brk;
    }

    fn send_request<'a>(&'a mut self, opts: JsonValue) -> BoxFuture<'a, Result<JsonValue, String>> {
        Box::pin(async move {
            let resolved = resolve_json(&opts, self.env).map_err(|e| e.to_string())?;
            let req = request_from_opts(&resolved)?;
            let timeout = resolved
                .get("timeout")
                .and_then(JsonValue::as_u64)
                .map(Duration::from_millis)
                .unwrap_or(self.timeout);
            let resp = self
                .http
                .send(req, timeout)
                .await
                .map_err(|e| e.to_string())?;
            let body = if resp.is_json() {
                serde_json::from_slice(&resp.body)
                    .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&resp.body).into_owned()))
            } else {
                JsonValue::String(String::from_utf8_lossy(&resp.body).into_owned())
            };
            Ok(json!({
                "status": resp.status,
                "headers": resp.headers,
                "body": body,
            }))
        })
    }
}

fn request_from_opts(opts: &JsonValue) -> Result<HttpRequest, String> {
    let url = opts
        .get("url")
        .and_then(JsonValue::as_str)
        .ok_or("send_request requires a url")?
        .to_string();
    let method = opts
        .get("method")
        .and_then(JsonValue::as_str)
        .unwrap_or("GET")
        .to_string();
    let mut headers = std::collections::BTreeMap::new();
    if let Some(JsonValue::Object(map)) = opts.get("headers") {
        for (k, v) in map {
            let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
            headers.insert(k.clone(), value);
        }
    }
    let basic_auth = opts.get("auth").and_then(|auth| {
        Some((
            auth.get("user")?.as_str()?.to_string(),
            auth.get("pass")?.as_str()?.to_string(),
        ))
    });
    Ok(HttpRequest {
        method,
        url,
        headers,
        body: opts.get("body").cloned(),
        basic_auth,
    })
}

/// Run a user function stage (`onBeforeRun` / `onAfterRun`).
pub(crate) async fn run_user_fn(
    shared: &Shared,
    f: &HookFn,
    env: &mut Environment,
    stage: &str,
) -> Result<(), ExecError> {
    let mut brk = false;
    let mut ctx = ExecHookCtx {
        env,
        brk: &mut brk,
        http: shared.http.clone(),
        timeout: shared.config.timeout,
    };
    f(&mut ctx).await.map_err(|message| ExecError::Hook {
        hook: stage.to_string(),
        message,
    })
}

enum HookApiOutcome {
    Ran,
    /// The response status was listed in `quit`; the chain ends silently.
    Quit,
}

/// Execute a hook chain in order. `set_break(true)` inside a hook skips the
/// rest of the chain without error; a non-fatal hook failure is logged and
/// skipped.
pub(crate) async fn run_chain(
    shared: &Shared,
    chain: &[Hook],
    env: &mut Environment,
    ctx_id: &str,
    stage: &str,
) -> Result<(), ExecError> {
    let mut brk = false;
    for hook in chain {
        match hook {
            Hook::Func(f) => {
                let mut ctx = ExecHookCtx {
                    env: &mut *env,
                    brk: &mut brk,
                    http: shared.http.clone(),
                    timeout: shared.config.timeout,
                };
                f(&mut ctx).await.map_err(|message| ExecError::Hook {
                    hook: stage.to_string(),
                    message,
                })?;
            }
            Hook::Api { name, quit, fatal } => {
                match run_hook_api(shared, name, quit, env).await {
                    Ok(HookApiOutcome::Quit) => return Ok(()),
                    Ok(HookApiOutcome::Ran) => {}
                    Err(e) if *fatal => return Err(e),
                    Err(e) => {
                        tracing::warn!(ctx = %ctx_id, hook = %name, error = %e, "non-fatal hook failed");
                    }
                }
            }
        }
        if brk {
            break;
        }
    }
    Ok(())
}

/// Run a peer API inside the current context: substitute, dispatch,
/// validate, apply its actions to this context's environment.
async fn run_hook_api(
    shared: &Shared,
    name: &str,
    quit: &[u16],
    env: &mut Environment,
) -> Result<HookApiOutcome, ExecError> {
    let api = shared
        .plan
        .api_by_name(name)
        .ok_or_else(|| ExecError::UnknownHookApi(name.to_string()))?;
    let req = build_request(api, env)?;
    let resp = shared
        .http
        .send(req, timeout_for(api, &shared.config))
        .await?;
    if quit.contains(&resp.status) {
        return Ok(HookApiOutcome::Quit);
    }
    let body = validate_response(api, &resp)?;
    apply_actions(api, body.as_ref(), env)?;
    Ok(HookApiOutcome::Ran)
}
