use std::collections::BTreeSet;

use hdt_core::types::{ValueSource, VarNew};
use hdt_core::{build_plan, ConcreteApi, Expanded, Plan, PlanOptions};

fn api(name: &str, consumes: &[&str], produces: &[&str]) -> ConcreteApi {
    ConcreteApi {
        name: name.to_string(),
        expected_status: 200,
        consumes: consumes.iter().map(|s| s.to_string()).collect(),
        produces: produces.iter().map(|s| s.to_string()).collect(),
        ..ConcreteApi::default()
    }
}

fn predefined(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn names_of(plan: &Plan, ids: &[usize]) -> Vec<String> {
    ids.iter()
        .map(|&id| plan.api_of(id).map(|a| a.name.clone()).unwrap_or_default())
        .collect()
}

/// Every node's consumes must be covered by its path produces plus the
/// predefined set.
fn assert_dependency_complete(plan: &Plan, predefined: &BTreeSet<String>) {
    for (id, node) in plan.nodes.iter().enumerate() {
        let Some(api) = plan.api_of(id) else { continue };
        if node.satellite {
            continue;
        }
        for consumed in &api.consumes {
            assert!(
                node.produces.contains(consumed) || predefined.contains(consumed),
                "node {} ({}) consumes {} which is neither produced on its path nor predefined",
                node.id,
                api.name,
                consumed
            );
        }
    }
}

#[test]
fn linear_chain_orders_producer_before_consumer() {
    let expanded = Expanded {
        apis: vec![
            api("login", &["userName", "userPass"], &["token"]),
            api("whoami", &["token"], &[]),
        ],
        referenced: BTreeSet::new(),
    };
    let pre = predefined(&["userName", "userPass"]);
    let plan = build_plan(expanded, &pre, &PlanOptions::default()).unwrap();

    let root = &plan.nodes[plan.root];
    assert_eq!(names_of(&plan, &root.children), vec!["login"]);
    let login = root.children[0];
    assert_eq!(names_of(&plan, &plan.nodes[login].children), vec!["whoami"]);
    assert_dependency_complete(&plan, &pre);
}

#[test]
fn producer_is_seeded_even_when_not_selected() {
    let expanded = Expanded {
        apis: vec![api("useX", &["x"], &[]), api("makeX", &[], &["x"])],
        referenced: BTreeSet::new(),
    };
    let pre = predefined(&[]);
    let options = PlanOptions {
        test_filters: vec!["useX".to_string()],
    };
    let plan = build_plan(expanded, &pre, &options).unwrap();

    let root = &plan.nodes[plan.root];
    assert_eq!(names_of(&plan, &root.children), vec!["makeX"]);
    let make_x = root.children[0];
    assert_eq!(names_of(&plan, &plan.nodes[make_x].children), vec!["useX"]);
    assert_dependency_complete(&plan, &pre);
}

#[test]
fn consumer_is_placed_under_every_producing_subtree() {
    let expanded = Expanded {
        apis: vec![
            api("makeX1", &[], &["x"]),
            api("makeX2", &[], &["x"]),
            api("useX", &["x"], &[]),
        ],
        referenced: BTreeSet::new(),
    };
    let pre = predefined(&[]);
    let plan = build_plan(expanded, &pre, &PlanOptions::default()).unwrap();

    let root = &plan.nodes[plan.root];
    assert_eq!(names_of(&plan, &root.children), vec!["makeX1", "makeX2"]);
    for &producer in &root.children {
        assert_eq!(
            names_of(&plan, &plan.nodes[producer].children),
            vec!["useX"],
            "useX must run under every producer of x"
        );
    }
    assert_dependency_complete(&plan, &pre);
}

#[test]
fn missing_producer_is_a_compile_error() {
    let expanded = Expanded {
        apis: vec![api("useX", &["x"], &[])],
        referenced: BTreeSet::new(),
    };
    let err = build_plan(expanded, &predefined(&[]), &PlanOptions::default()).unwrap_err();
    assert!(err
        .violations
        .iter()
        .any(|v| v.message.contains("no producer exists for variable x")));
}

#[test]
fn referenced_apis_are_never_inserted_standalone() {
    let mut create = api("createApp", &["appName"], &["appGuid"]);
    create.var_new = Some(VarNew {
        name: "appGuid".to_string(),
        source: ValueSource::Path(hdt_core::paths::DataPath::root()),
        get: "getApp".to_string(),
        delete: "delApp".to_string(),
        serial_vars: vec!["appName".to_string()],
    });
    let expanded = Expanded {
        apis: vec![
            create,
            api("getApp", &["appName"], &[]),
            api("delApp", &["appName"], &[]),
        ],
        referenced: ["getApp", "delApp"].iter().map(|s| s.to_string()).collect(),
    };
    let pre = predefined(&["appName"]);
    let plan = build_plan(expanded, &pre, &PlanOptions::default()).unwrap();

    let root = &plan.nodes[plan.root];
    assert_eq!(names_of(&plan, &root.children), vec!["createApp"]);

    let k = &plan.nodes[root.children[0]];
    let pre_run = k.pre_run.expect("constructor node has a preRun");
    let post_run = k.post_run.expect("constructor node has a postRun");
    assert_eq!(plan.api_of(pre_run).unwrap().name, "getApp");
    assert_eq!(
        names_of(&plan, &plan.nodes[pre_run].children),
        vec!["delApp"]
    );
    assert_eq!(plan.api_of(post_run).unwrap().name, "delApp");
    assert!(plan.nodes[pre_run].satellite);
    assert!(plan.nodes[post_run].satellite);
}

#[test]
fn missing_getter_is_a_compile_error() {
    let mut create = api("createApp", &[], &["appGuid"]);
    create.var_new = Some(VarNew {
        name: "appGuid".to_string(),
        source: ValueSource::Path(hdt_core::paths::DataPath::root()),
        get: "getApp".to_string(),
        delete: "delApp".to_string(),
        serial_vars: vec!["appName".to_string()],
    });
    let expanded = Expanded {
        apis: vec![create],
        referenced: ["getApp", "delApp"].iter().map(|s| s.to_string()).collect(),
    };
    let err = build_plan(expanded, &predefined(&[]), &PlanOptions::default()).unwrap_err();
    assert!(err
        .violations
        .iter()
        .any(|v| v.message.contains("getter getApp does not resolve")));
}

#[test]
fn no_api_repeats_on_its_own_path() {
    // keepalive consumes and produces the same name; it must not stack under
    // itself.
    let expanded = Expanded {
        apis: vec![
            api("mint", &[], &["session"]),
            api("keepalive", &["session"], &["session"]),
            api("useSession", &["session"], &[]),
        ],
        referenced: BTreeSet::new(),
    };
    let pre = predefined(&[]);
    let plan = build_plan(expanded, &pre, &PlanOptions::default()).unwrap();

    for (id, node) in plan.nodes.iter().enumerate() {
        let Some(api) = plan.api_of(id) else { continue };
        let mut cur = node.parent;
        while let Some(parent) = cur {
            if let Some(parent_api) = plan.api_of(parent) {
                assert_ne!(
                    parent_api.name, api.name,
                    "API {} appears twice on one path",
                    api.name
                );
            }
            cur = plan.nodes[parent].parent;
        }
    }
    assert_dependency_complete(&plan, &pre);
}

#[test]
fn group_prefixes_select_apis() {
    let mut tagged = api("v1/orders/list", &[], &[]);
    tagged.groups = vec!["orders".to_string()];
    let expanded = Expanded {
        apis: vec![tagged, api("v1/users/list", &[], &[])],
        referenced: BTreeSet::new(),
    };
    let options = PlanOptions {
        test_filters: vec!["orders".to_string()],
    };
    let plan = build_plan(expanded, &predefined(&[]), &options).unwrap();
    let root = &plan.nodes[plan.root];
    assert_eq!(names_of(&plan, &root.children), vec!["v1/orders/list"]);
}

#[test]
fn render_is_deterministic() {
    let expanded = Expanded {
        apis: vec![
            api("login", &["userName"], &["token"]),
            api("whoami", &["token"], &[]),
        ],
        referenced: BTreeSet::new(),
    };
    let plan = build_plan(expanded, &predefined(&["userName"]), &PlanOptions::default()).unwrap();
    assert_eq!(
        plan.render(),
        "0: <root>\n  0.0: login\n    0.0.0: whoami\n"
    );
}
