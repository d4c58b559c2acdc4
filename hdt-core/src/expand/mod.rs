mod scan;

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Violation};
use crate::schema;
use crate::types::{
    Action, ApiDescriptor, Catalog, Hook, HookSet, RequestTemplate, VarNew, VarValue, VirtualHost,
};
use crate::vars::subst::{partial_json, partial_str, scan_json_refs, scan_refs};
use crate::vars::Environment;

pub(crate) use scan::ACTION_KEYS;

/// The planner's unit: one (response, test variant, variable combination) of
/// a descriptor, with the request ground on enumerated axes and all actions
/// resolved.
#[derive(Debug, Clone, Default)]
pub struct ConcreteApi {
    pub name: String,
    pub vhost: String,
    pub request: RequestTemplate,
    pub expected_status: u16,
    pub ignore_body: bool,
    /// Translated response-body schema (documentation form).
    pub response_schema: Option<JsonValue>,
    /// Every `$var` in the request plus declared extras, in
    /// first-appearance order (the planner's tie-break relies on it).
    pub consumes: Vec<String>,
    pub produces: BTreeSet<String>,
    pub deletes: BTreeSet<String>,
    pub actions: Vec<Action>,
    pub var_new: Option<VarNew>,
    /// Queue keys for per-resource serialization.
    pub serial_vars: Vec<String>,
    pub hooks: HookSet,
    pub groups: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Expanded {
    pub apis: Vec<ConcreteApi>,
    /// Names referenced as getter/destructor/hook peers; a referenced API is
    /// never inserted standalone.
    pub referenced: BTreeSet<String>,
}

/// Explode every descriptor into its Concrete APIs. Violations accumulate;
/// nothing is planned while any is present.
pub fn expand_descriptors(
    descriptors: &[ApiDescriptor],
    vhosts: &[VirtualHost],
    catalog: &Catalog,
) -> Result<Expanded, CompileError> {
    let mut out = Expanded::default();
    let mut violations = Vec::new();

    for desc in descriptors {
        expand_one(desc, vhosts, catalog, &mut out, &mut violations);
    }

    let mut seen = BTreeSet::new();
    for api in &out.apis {
        if !seen.insert(api.name.as_str()) {
            violations.push(Violation::new(&api.name, "duplicate concrete API name"));
        }
    }

    if violations.is_empty() {
        Ok(out)
    } else {
        Err(CompileError::new(violations))
    }
}

fn expand_one(
    desc: &ApiDescriptor,
    vhosts: &[VirtualHost],
    catalog: &Catalog,
    out: &mut Expanded,
    violations: &mut Vec<Violation>,
) {
    let mut base_request = desc.request.clone();
    if let Some(vhost) = vhosts.iter().find(|v| v.name == desc.vhost) {
        base_request.path = format!("${{{}}}{}", vhost.host_variable, base_request.path);
    }

    let Some(primary) = desc.responses.keys().next().copied() else {
        violations.push(Violation::new(&desc.name, "descriptor has no responses"));
        return;
    };

    for (&status, resp) in &desc.responses {
        let response_schema = match (&resp.schema, &resp.body) {
            (Some(schema), _) => Some(schema.clone()),
            (None, Some(sketch)) => match schema::translate_sketch(sketch) {
                Ok(mut translated) => {
                    if let Some(overlay) = &resp.bodymd {
                        if let Err(e) = schema::apply_bodymd(&mut translated, overlay) {
                            violations.push(Violation::new(&desc.name, e.to_string()));
                        }
                    }
                    Some(translated)
                }
                Err(e) => {
                    violations.push(Violation::new(&desc.name, e.to_string()));
                    None
                }
            },
            (None, None) => None,
        };

        let default_tests;
        let (tests, explicit) = match &resp.tests {
            Some(tests) => (tests.as_slice(), true),
            None => {
                default_tests = [crate::types::TestSpec::default()];
                (&default_tests[..], false)
            }
        };

        for (ti, test) in tests.iter().enumerate() {
            let mut name = desc.name.clone();
            if status != primary {
                name.push_str(&format!(":{status}"));
            }
            if let Some(test_name) = &test.name {
                name.push_str(&format!(".{test_name}"));
            } else if explicit && ti > 0 {
                name.push_str(&format!(".{ti}"));
            }

            let hooks = test
                .hooks
                .or_inherit(&resp.hooks)
                .or_inherit(&desc.hooks)
                .into_set();
            let hooks = qualify_hooks(hooks, &desc.vhost);

            // Ground the per-test variable overrides into the request.
            let mut overlay = Environment::new();
            for (k, v) in &test.vars {
                overlay.set(k.clone(), v.clone());
            }
            let grounded = ground_request(&base_request, &overlay);

            // Enumerated axes: request variables with a candidate list in
            // the catalogue, not pinned by the test.
            let mut refs = Vec::new();
            scan_request_refs(&grounded, &mut refs);
            let mut axes = Vec::new();
            for var in &refs {
                if test.vars.contains_key(var) {
                    continue;
                }
                if let Some(VarValue::OneOf(items)) =
                    catalog.get(var).and_then(|d| d.value.as_ref())
                {
                    if items.is_empty() {
                        violations.push(Violation::new(
                            &name,
                            format!("enumeration {var} has no candidate values"),
                        ));
                        return;
                    }
                    axes.push((var.clone(), items.clone()));
                }
            }
            axes.sort_by(|a, b| a.0.cmp(&b.0));

            for (k, combo) in cartesian(&axes).into_iter().enumerate() {
                let request = if combo.is_empty() {
                    grounded.clone()
                } else {
                    let mut env = Environment::new();
                    for (n, v) in &combo {
                        env.set(n.clone(), v.clone());
                    }
                    ground_request(&grounded, &env)
                };

                let name = if k == 0 { name.clone() } else { format!("{name}-{k}") };

                let default_serial = request
                    .body
                    .as_ref()
                    .map(|body| {
                        let mut refs = Vec::new();
                        scan_json_refs(body, &mut refs);
                        refs
                    })
                    .unwrap_or_default();

                let scan = scan::scan_actions(
                    &name,
                    &desc.vhost,
                    resp.body.as_ref(),
                    &test.extra,
                    &default_serial,
                );
                violations.extend(scan.violations);
                out.referenced.extend(scan.referenced);
                for hook_ref in hooks.api_refs() {
                    out.referenced.insert(hook_ref.to_string());
                }

                let mut consumes = Vec::new();
                scan_request_refs(&request, &mut consumes);
                for extra in &desc.consumes {
                    if !consumes.iter().any(|c| c == extra) {
                        consumes.push(extra.clone());
                    }
                }

                let mut produces: BTreeSet<String> =
                    desc.produces.iter().cloned().collect();
                let mut deletes = BTreeSet::new();
                for action in &scan.actions {
                    if let Some(p) = action.produced() {
                        produces.insert(p.to_string());
                    }
                    if let Some(d) = action.deleted() {
                        deletes.insert(d.to_string());
                    }
                }

                let serial_vars = match &scan.var_new {
                    Some(var_new) => match &resp.serial_vars {
                        Some(explicit) => explicit.clone(),
                        None => var_new.serial_vars.clone(),
                    },
                    None => resp.serial_vars.clone().unwrap_or_default(),
                };

                out.apis.push(ConcreteApi {
                    name,
                    vhost: desc.vhost.clone(),
                    request,
                    expected_status: status,
                    ignore_body: resp.ignore_body,
                    response_schema: response_schema.clone(),
                    consumes,
                    produces,
                    deletes,
                    actions: scan.actions,
                    var_new: scan.var_new,
                    serial_vars,
                    hooks: hooks.clone(),
                    groups: desc.groups.clone(),
                });
            }
        }
    }
}

fn ground_request(request: &RequestTemplate, env: &Environment) -> RequestTemplate {
    let mut out = request.clone();
    out.path = partial_str(&request.path, env);
    out.headers = request
        .headers
        .iter()
        .map(|(k, v)| (partial_str(k, env), partial_str(v, env)))
        .collect();
    if let Some(auth) = &mut out.auth {
        auth.user = partial_str(&auth.user, env);
        auth.pass = partial_str(&auth.pass, env);
    }
    if let Some(body) = &request.body {
        out.body = Some(partial_json(body, env));
    }
    out
}

/// Request variable references in deterministic first-appearance order:
/// path, headers, auth, body.
fn scan_request_refs(request: &RequestTemplate, out: &mut Vec<String>) {
    scan_refs(&request.path, out);
    for (k, v) in &request.headers {
        scan_refs(k, out);
        scan_refs(v, out);
    }
    if let Some(auth) = &request.auth {
        scan_refs(&auth.user, out);
        scan_refs(&auth.pass, out);
    }
    if let Some(body) = &request.body {
        scan_json_refs(body, out);
    }
}

fn cartesian(axes: &[(String, Vec<JsonValue>)]) -> Vec<Vec<(String, JsonValue)>> {
    let mut out = vec![Vec::new()];
    for (name, candidates) in axes {
        let mut next = Vec::with_capacity(out.len() * candidates.len());
        for prefix in &out {
            for candidate in candidates {
                let mut row = prefix.clone();
                row.push((name.clone(), candidate.clone()));
                next.push(row);
            }
        }
        out = next;
    }
    out
}

fn qualify_hooks(mut hooks: HookSet, vhost: &str) -> HookSet {
    if vhost.is_empty() {
        return hooks;
    }
    let qualify = |chain: &mut Vec<Hook>| {
        for hook in chain {
            if let Hook::Api { name, .. } = hook {
                if !name.contains('/') {
                    *name = format!("{vhost}/{name}");
                }
            }
        }
    };
    qualify(&mut hooks.before);
    qualify(&mut hooks.after_api);
    qualify(&mut hooks.after_all);
    hooks
}
