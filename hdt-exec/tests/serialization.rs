use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use hdt_core::types::{Catalog, Hook, RequestTemplate, ResponseDescriptor, VarDecl};
use hdt_core::vars::resolve_catalog;
use hdt_core::{build_plan, expand_descriptors, ApiDescriptor, PlanOptions};
use hdt_exec::{Executor, ExecutorConfig, HttpClient, HttpError, HttpRequest, HttpResponse};

struct SlowMock {
    /// `"METHOD url"` → (status, body, delay_ms).
    responses: HashMap<String, (u16, JsonValue, u64)>,
    log: Mutex<Vec<String>>,
    monitor_prefix: &'static str,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowMock {
    fn new(routes: &[(&str, u16, JsonValue, u64)], monitor_prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            responses: routes
                .iter()
                .map(|(k, s, b, d)| (k.to_string(), (*s, b.clone(), *d)))
                .collect(),
            log: Mutex::new(Vec::new()),
            monitor_prefix,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for SlowMock {
    async fn send(&self, req: HttpRequest, _timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {}", req.method, req.url));
        let key = format!("{} {}", req.method, req.url);
        let (status, body, delay) = self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or((599, json!({}), 0));

        let monitored = !self.monitor_prefix.is_empty() && req.url.starts_with(self.monitor_prefix);
        if monitored {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if monitored {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        Ok(HttpResponse {
            status,
            headers: [(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]
            .into(),
            body: serde_json::to_vec(&body).unwrap(),
        })
    }
}

fn constructor(name: &str, create_path: &str) -> ApiDescriptor {
    let mut responses = BTreeMap::new();
    responses.insert(
        200,
        ResponseDescriptor {
            body: Some(json!({
                "guid": {"var_new": {
                    "name": format!("{name}Guid"),
                    "get": "getApp",
                    "delete": "delApp",
                    "serial_vars": ["appName"],
                }}
            })),
            ..ResponseDescriptor::default()
        },
    );
    ApiDescriptor {
        name: name.to_string(),
        request: RequestTemplate {
            method: "POST".to_string(),
            path: create_path.to_string(),
            body: Some(json!({"name": "$appName"})),
            ..RequestTemplate::default()
        },
        responses,
        ..ApiDescriptor::default()
    }
}

fn peer(name: &str, method: &str, path: &str) -> ApiDescriptor {
    let mut responses = BTreeMap::new();
    responses.insert(
        200,
        ResponseDescriptor {
            ignore_body: true,
            ..ResponseDescriptor::default()
        },
    );
    ApiDescriptor {
        name: name.to_string(),
        request: RequestTemplate {
            method: method.to_string(),
            path: path.to_string(),
            ..RequestTemplate::default()
        },
        responses,
        ..ApiDescriptor::default()
    }
}

#[tokio::test]
async fn equal_queue_keys_never_overlap_their_main_requests() {
    let client = SlowMock::new(
        &[
            ("GET /app", 200, json!({}), 0),
            ("DELETE /app", 200, json!({}), 0),
            ("POST /apps/a", 200, json!({"guid": "ga"}), 20),
            ("POST /apps/b", 200, json!({"guid": "gb"}), 20),
        ],
        "/apps/",
    );

    let descriptors = vec![
        constructor("createA", "/apps/a"),
        constructor("createB", "/apps/b"),
        peer("getApp", "GET", "/app"),
        peer("delApp", "DELETE", "/app"),
    ];
    let catalog: Catalog = [(
        "appName".to_string(),
        VarDecl::with_value("app name", json!("shared")),
    )]
    .into();

    let expanded = expand_descriptors(&descriptors, &[], &catalog).unwrap();
    let env = resolve_catalog(&catalog).unwrap();
    let predefined = env.names().map(str::to_string).collect();
    let plan = build_plan(expanded, &predefined, &PlanOptions::default()).unwrap();

    let executor = Executor::new(plan, client.clone(), ExecutorConfig::default());
    let report = executor.run(env).await;
    assert!(report.is_success(), "failures: {:?}", report.contexts);

    // Serialization safety: with an equal appName the two creations hold the
    // same queue key and must not overlap.
    assert_eq!(client.peak.load(Ordering::SeqCst), 1);

    // Full-waterfall serialization: the first constructor's postRun
    // destructor lands before the second constructor's main request.
    let urls = client.urls();
    let first_create = urls
        .iter()
        .position(|u| u.starts_with("POST /apps/"))
        .unwrap();
    let second_create = urls
        .iter()
        .rposition(|u| u.starts_with("POST /apps/"))
        .unwrap();
    assert!(second_create > first_create);
    assert!(
        urls[first_create..second_create]
            .iter()
            .any(|u| u == "DELETE /app"),
        "no destructor between the serialized creations: {urls:?}"
    );
}

#[tokio::test]
async fn pre_run_failures_are_ignored() {
    // The getter 404s (no leftover state): its destructor child is skipped
    // and the constructor still runs.
    let client = SlowMock::new(
        &[
            ("GET /app", 404, json!({}), 0),
            ("POST /apps/a", 200, json!({"guid": "ga"}), 0),
            ("DELETE /app", 200, json!({}), 0),
        ],
        "",
    );

    let descriptors = vec![
        constructor("createA", "/apps/a"),
        peer("getApp", "GET", "/app"),
        peer("delApp", "DELETE", "/app"),
    ];
    let catalog: Catalog = [(
        "appName".to_string(),
        VarDecl::with_value("app name", json!("solo")),
    )]
    .into();

    let expanded = expand_descriptors(&descriptors, &[], &catalog).unwrap();
    let env = resolve_catalog(&catalog).unwrap();
    let predefined = env.names().map(str::to_string).collect();
    let plan = build_plan(expanded, &predefined, &PlanOptions::default()).unwrap();

    let executor = Executor::new(plan, client.clone(), ExecutorConfig::default());
    let report = executor.run(env).await;

    assert!(report.is_success(), "failures: {:?}", report.contexts);
    // getter (ignored failure), create, postRun destructor; the preRun
    // destructor never ran because the getter found nothing.
    assert_eq!(
        client.urls(),
        vec!["GET /app", "POST /apps/a", "DELETE /app"]
    );
}

#[tokio::test]
async fn sibling_environments_are_isolated() {
    let client = SlowMock::new(
        &[
            ("GET /s1", 200, json!({"secret": "S"}), 0),
            ("GET /s2", 200, json!({}), 30),
        ],
        "",
    );

    let mut s1_responses = BTreeMap::new();
    s1_responses.insert(
        200,
        ResponseDescriptor {
            body: Some(json!({"secret": {"__": "(s)leaky", "var_set": {"name": "leak"}}})),
            ..ResponseDescriptor::default()
        },
    );
    let s1 = ApiDescriptor {
        name: "s1".to_string(),
        request: RequestTemplate {
            path: "/s1".to_string(),
            ..RequestTemplate::default()
        },
        responses: s1_responses,
        ..ApiDescriptor::default()
    };

    let observed = Arc::new(Mutex::new(None));
    let observed_in_hook = observed.clone();
    let mut s2 = peer("s2", "GET", "/s2");
    s2.hooks.after_all = Some(vec![Hook::Func(Arc::new(move |ctx| {
        *observed_in_hook.lock().unwrap() = Some(ctx.get_var("leak").is_some());
        Box::pin(async { Ok(()) })
    }))]);

    let descriptors = vec![s1, s2];
    let expanded = expand_descriptors(&descriptors, &[], &Catalog::new()).unwrap();
    let plan = build_plan(expanded, &Default::default(), &PlanOptions::default()).unwrap();
    let executor = Executor::new(plan, client, ExecutorConfig::default());
    let report = executor
        .run(hdt_core::vars::Environment::new())
        .await;

    assert!(report.is_success(), "failures: {:?}", report.contexts);
    // s1 finished (and set `leak`) well before s2's delayed hook looked:
    // the sibling still must not see it.
    assert_eq!(*observed.lock().unwrap(), Some(false));
}
