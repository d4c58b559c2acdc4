use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use hdt_core::expand::ConcreteApi;
use hdt_core::planner::{NodeId, Plan};
use hdt_core::vars::{EnvValue, Environment};
use serde_json::Value as JsonValue;

use super::actions::apply_actions;
use super::hooks::{run_chain, run_user_fn};
use super::http::HttpClient;
use super::queue::SerialQueues;
use super::request::{build_request, queue_key, timeout_for};
use super::result::{ContextResult, ExecError, RunReport};
use super::types::ExecutorConfig;
use super::validate::validate_response;

pub(crate) struct Shared {
    pub plan: Plan,
    pub http: Arc<dyn HttpClient>,
    pub config: ExecutorConfig,
    pub queues: SerialQueues,
    pub report: Mutex<RunReport>,
}

impl Shared {
    fn record(&self, id: &str, api: &str, error: Option<&ExecError>, ignored: bool) {
        match error {
            Some(e) if ignored => {
                tracing::debug!(ctx = %id, api = %api, error = %e, "ignored failure (cleanup context)");
            }
            Some(e) => {
                tracing::error!(ctx = %id, api = %api, error = %e, "context failed");
            }
            None => {
                tracing::info!(ctx = %id, api = %api, "context passed");
            }
        }
        let mut report = self.report.lock().expect("report mutex poisoned");
        report.contexts.push(ContextResult {
            id: id.to_string(),
            api: api.to_string(),
            error: error.map(ToString::to_string),
            ignored,
        });
    }
}

/// Walks the compiled plan: sibling subtrees in parallel over cloned
/// environments, the nine-stage waterfall per node, serialization queues
/// around same-keyed constructors.
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    pub fn new(plan: Plan, http: Arc<dyn HttpClient>, config: ExecutorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                plan,
                http,
                config,
                queues: SerialQueues::default(),
                report: Mutex::new(RunReport::default()),
            }),
        }
    }

    pub async fn run(&self, env: Environment) -> RunReport {
        let root = self.shared.plan.root;
        run_children(self.shared.clone(), root, &env, false).await;
        std::mem::take(&mut *self.shared.report.lock().expect("report mutex poisoned"))
    }
}

/// Run all children of a node concurrently, each on a deep copy of the
/// environment. Returns true when every child subtree passed.
async fn run_children(shared: Arc<Shared>, node: NodeId, env: &Environment, ignore: bool) -> bool {
    let children = shared.plan.nodes[node].children.clone();
    let mut handles = Vec::with_capacity(children.len());
    for child in children {
        let shared = shared.clone();
        let env = env.clone();
        handles.push(tokio::spawn(async move {
            run_node(shared, child, env, ignore).await
        }));
    }
    let mut ok = true;
    for handle in handles {
        ok &= handle.await.unwrap_or(false);
    }
    ok
}

type BoxedRun = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Run one tree node: expand variable combinations against the consumed
/// names, then run the waterfall once per combination, sequentially.
fn run_node(shared: Arc<Shared>, node: NodeId, env: Environment, ignore: bool) -> BoxedRun {
    Box::pin(async move {
        let Some(api_idx) = shared.plan.nodes[node].api else {
            return run_children(shared.clone(), node, &env, ignore).await;
        };
        let api = &shared.plan.apis[api_idx];
        let node_id = shared.plan.nodes[node].id.clone();

        let combos = match combinations(api, &env) {
            Ok(combos) => combos,
            Err(e) => {
                shared.record(&node_id, &api.name, Some(&e), ignore);
                return ignore;
            }
        };

        let single = combos.len() == 1;
        let mut all_ok = true;
        for (j, combo_env) in combos.into_iter().enumerate() {
            let ctx_id = if single {
                node_id.clone()
            } else {
                format!("{node_id}#{j}")
            };
            all_ok &= waterfall(&shared, node, api_idx, &ctx_id, combo_env, ignore).await;
        }
        all_ok
    })
}

/// Consumed names whose current value is an enumeration fan out into the
/// Cartesian product, iterated in sorted-name order.
fn combinations(api: &ConcreteApi, env: &Environment) -> Result<Vec<Environment>, ExecError> {
    let mut axes: Vec<(String, Vec<JsonValue>)> = Vec::new();
    for name in &api.consumes {
        if let Some(EnvValue::Many(items)) = env.get(name) {
            if items.is_empty() {
                return Err(ExecError::EmptyCombination(name.clone()));
            }
            axes.push((name.clone(), items.clone()));
        }
    }
    axes.sort_by(|a, b| a.0.cmp(&b.0));

    if axes.is_empty() {
        return Ok(vec![env.clone()]);
    }

    let mut out = vec![env.clone()];
    for (name, candidates) in axes {
        let mut next = Vec::with_capacity(out.len() * candidates.len());
        for base in &out {
            for candidate in &candidates {
                let mut pinned = base.clone();
                pinned.set(name.clone(), candidate.clone());
                next.push(pinned);
            }
        }
        out = next;
    }
    Ok(out)
}

/// The nine-stage waterfall. The first error wins but cleanup stages still
/// run on the recorded progress flags; the serialization queue is held from
/// the main-request stage through postRun.
async fn waterfall(
    shared: &Arc<Shared>,
    node: NodeId,
    api_idx: usize,
    ctx_id: &str,
    mut env: Environment,
    ignore: bool,
) -> bool {
    let api = &shared.plan.apis[api_idx];
    let tree_node = &shared.plan.nodes[node];
    let mut first_err: Option<ExecError> = None;

    // 1. preRun: leftover-state cleanup, failures ignored.
    if let Some(pre) = tree_node.pre_run {
        let _ = run_node(shared.clone(), pre, env.clone(), true).await;
    }

    // 2. onBeforeRun
    let mut on_before_ok = true;
    if let Some(f) = &api.hooks.on_before_run {
        if let Err(e) = run_user_fn(shared, f, &mut env, "onBeforeRun").await {
            on_before_ok = false;
            remember(&mut first_err, e);
        }
    }

    // 3. before
    let mut before_ok = false;
    if on_before_ok {
        match run_chain(shared, &api.hooks.before, &mut env, ctx_id, "before").await {
            Ok(()) => before_ok = true,
            Err(e) => remember(&mut first_err, e),
        }
    }

    // 4. main request (queue-gated)
    let mut main_ok = false;
    let mut held_key: Option<String> = None;
    if on_before_ok && before_ok {
        match main_request(shared, api, ctx_id, &mut env, &mut held_key).await {
            Ok(()) => main_ok = true,
            Err(e) => remember(&mut first_err, e),
        }
    }

    // 5. afterApi
    let mut after_api_ok = false;
    if main_ok {
        match run_chain(shared, &api.hooks.after_api, &mut env, ctx_id, "afterApi").await {
            Ok(()) => after_api_ok = true,
            Err(e) => remember(&mut first_err, e),
        }
    }

    // 6. children (concurrent)
    let mut children_ok = true;
    if after_api_ok {
        children_ok = run_children(shared.clone(), node, &env, ignore).await;
    }

    // 7. afterAll (runs even when a child failed)
    if after_api_ok {
        if let Err(e) = run_chain(shared, &api.hooks.after_all, &mut env, ctx_id, "afterAll").await
        {
            remember(&mut first_err, e);
        }
    }

    // 8. onAfterRun
    if on_before_ok {
        if let Some(f) = &api.hooks.on_after_run {
            if let Err(e) = run_user_fn(shared, f, &mut env, "onAfterRun").await {
                remember(&mut first_err, e);
            }
        }
    }

    // 9. postRun: destructor subtree.
    if before_ok {
        if let Some(post) = tree_node.post_run {
            if !run_node(shared.clone(), post, env.clone(), ignore).await {
                remember(
                    &mut first_err,
                    ExecError::Action("postRun cleanup failed".to_string()),
                );
            }
        }
    }

    if let Some(key) = held_key {
        shared.queues.release(&key);
    }

    shared.record(ctx_id, &api.name, first_err.as_ref(), ignore);
    (first_err.is_none() || ignore) && children_ok
}

fn remember(slot: &mut Option<ExecError>, e: ExecError) {
    if slot.is_none() {
        *slot = Some(e);
    }
}

async fn main_request(
    shared: &Arc<Shared>,
    api: &ConcreteApi,
    ctx_id: &str,
    env: &mut Environment,
    held_key: &mut Option<String>,
) -> Result<(), ExecError> {
    if let Some(key) = queue_key(api, env)? {
        shared.queues.acquire(&key).await;
        *held_key = Some(key);
    }

    let req = build_request(api, env)?;
    tracing::debug!(ctx = %ctx_id, api = %api.name, method = %req.method, url = %req.url, "dispatching");
    let resp = shared
        .http
        .send(req.clone(), timeout_for(api, &shared.config))
        .await
        .map_err(|e| {
            tracing::debug!(ctx = %ctx_id, api = %api.name, url = %req.url, error = %e, "transport failure");
            ExecError::from(e)
        })?;

    let body = validate_response(api, &resp).map_err(|e| {
        tracing::debug!(
            ctx = %ctx_id,
            api = %api.name,
            url = %req.url,
            status = resp.status,
            body = %String::from_utf8_lossy(&resp.body),
            error = %e,
            "response rejected"
        );
        e
    })?;

    apply_actions(api, body.as_ref(), env)
}
