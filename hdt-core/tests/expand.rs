use std::collections::BTreeMap;

use serde_json::json;

use hdt_core::types::{Catalog, Hook, RequestTemplate, ResponseDescriptor, TestSpec, VarDecl};
use hdt_core::{expand_descriptors, ApiDescriptor};

fn catalog(pairs: &[(&str, serde_json::Value)]) -> Catalog {
    pairs
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                VarDecl::with_value(format!("{name} description"), value.clone()),
            )
        })
        .collect()
}

fn response_200(body: serde_json::Value) -> BTreeMap<u16, ResponseDescriptor> {
    let mut responses = BTreeMap::new();
    responses.insert(
        200,
        ResponseDescriptor {
            body: Some(body),
            ..ResponseDescriptor::default()
        },
    );
    responses
}

#[test]
fn enumerations_fan_out_into_indexed_variants() {
    let catalog = catalog(&[
        ("grantType", json!(["password", "client_credentials"])),
        ("authHdr", json!("basic")),
    ]);
    let desc = ApiDescriptor {
        name: "token".to_string(),
        request: RequestTemplate {
            method: "POST".to_string(),
            path: "/oauth/token".to_string(),
            headers: [("Authorization".to_string(), "$authHdr".to_string())].into(),
            body: Some(json!({"grant_type": "$grantType"})),
            ..RequestTemplate::default()
        },
        responses: response_200(json!({"access_token": "(s)the token"})),
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[], &catalog).unwrap();
    assert_eq!(expanded.apis.len(), 2);
    assert_eq!(expanded.apis[0].name, "token");
    assert_eq!(expanded.apis[1].name, "token-1");
    assert_eq!(
        expanded.apis[0].request.body,
        Some(json!({"grant_type": "password"}))
    );
    assert_eq!(
        expanded.apis[1].request.body,
        Some(json!({"grant_type": "client_credentials"}))
    );
    // The enumerated axis is ground; the scalar reference stays symbolic.
    for api in &expanded.apis {
        assert!(!api.consumes.iter().any(|c| c == "grantType"));
        assert!(api.consumes.iter().any(|c| c == "authHdr"));
    }
}

#[test]
fn secondary_statuses_and_named_tests_extend_the_name() {
    let mut responses = response_200(json!({"guid": "(s)the guid"}));
    responses.insert(
        404,
        ResponseDescriptor {
            tests: Some(vec![TestSpec {
                vars: [("appGuid".to_string(), json!("missing"))].into(),
                ..TestSpec::default()
            }]),
            ignore_body: true,
            ..ResponseDescriptor::default()
        },
    );
    let desc = ApiDescriptor {
        name: "getApp".to_string(),
        request: RequestTemplate {
            path: "/v2/apps/$appGuid".to_string(),
            ..RequestTemplate::default()
        },
        responses,
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[], &Catalog::new()).unwrap();
    let names: Vec<&str> = expanded.apis.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["getApp", "getApp:404"]);

    // The 404 test ground appGuid into the path, so it no longer consumes it.
    let not_found = &expanded.apis[1];
    assert_eq!(not_found.request.path, "/v2/apps/missing");
    assert!(not_found.consumes.is_empty());
    assert_eq!(not_found.expected_status, 404);
}

#[test]
fn actions_contribute_produces_and_deletes() {
    let desc = ApiDescriptor {
        name: "login".to_string(),
        consumes: vec!["extraIn".to_string()],
        produces: vec!["extraOut".to_string()],
        request: RequestTemplate {
            path: "/login".to_string(),
            body: Some(json!({"user": "$userName"})),
            ..RequestTemplate::default()
        },
        responses: response_200(json!({
            "access_token": {"__": "(s)token", "var_set": {"name": "token"}},
            "var_rename": {"from": "oldSession", "to": "session"},
        })),
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[], &Catalog::new()).unwrap();
    let api = &expanded.apis[0];
    assert_eq!(api.consumes, vec!["userName", "extraIn"]);
    for name in ["token", "session", "extraOut"] {
        assert!(api.produces.contains(name), "missing produced {name}");
    }
    assert!(api.deletes.contains("oldSession"));
}

#[test]
fn var_new_defaults_serial_vars_to_body_references() {
    let desc = ApiDescriptor {
        name: "createApp".to_string(),
        vhost: "v2".to_string(),
        request: RequestTemplate {
            method: "POST".to_string(),
            path: "/v2/apps".to_string(),
            body: Some(json!({"name": "$appName", "space": "$spaceGuid"})),
            ..RequestTemplate::default()
        },
        responses: response_200(json!({
            "guid": {"var_new": {"name": "appGuid", "get": "getApp", "delete": "delApp"}}
        })),
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[], &Catalog::new()).unwrap();
    let api = &expanded.apis[0];
    let var_new = api.var_new.as_ref().expect("var_new scanned");
    assert_eq!(var_new.serial_vars, vec!["appName", "spaceGuid"]);
    assert_eq!(var_new.get, "v2/getApp");
    assert_eq!(var_new.delete, "v2/delApp");
    assert!(expanded.referenced.contains("v2/getApp"));
    assert!(expanded.referenced.contains("v2/delApp"));
    assert_eq!(api.serial_vars, var_new.serial_vars);
}

#[test]
fn hooks_inherit_per_field_from_response_then_descriptor() {
    let desc = ApiDescriptor {
        name: "x".to_string(),
        hooks: hdt_core::types::HookDecls {
            before: Some(vec![Hook::api("descriptorBefore")]),
            after_all: Some(vec![Hook::api("descriptorAfterAll")]),
            ..hdt_core::types::HookDecls::default()
        },
        request: RequestTemplate {
            path: "/x".to_string(),
            ..RequestTemplate::default()
        },
        responses: {
            let mut responses = BTreeMap::new();
            responses.insert(
                200,
                ResponseDescriptor {
                    hooks: hdt_core::types::HookDecls {
                        before: Some(vec![Hook::api("responseBefore")]),
                        ..hdt_core::types::HookDecls::default()
                    },
                    ..ResponseDescriptor::default()
                },
            );
            responses
        },
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[], &Catalog::new()).unwrap();
    let hooks = &expanded.apis[0].hooks;
    // Response-level before wins; afterAll falls through to the descriptor.
    assert_eq!(hooks.before[0].api_name(), Some("responseBefore"));
    assert_eq!(hooks.after_all[0].api_name(), Some("descriptorAfterAll"));
    assert!(hooks.after_api.is_empty());
    // Hook references are registered so the peers never run standalone.
    assert!(expanded.referenced.contains("responseBefore"));
    assert!(expanded.referenced.contains("descriptorAfterAll"));
}

#[test]
fn host_variable_prefixes_the_request_path() {
    let vhost = hdt_core::types::VirtualHost {
        name: "v2".to_string(),
        host_variable: "apiHost".to_string(),
        header: json!(null),
    };
    let desc = ApiDescriptor {
        name: "list".to_string(),
        vhost: "v2".to_string(),
        request: RequestTemplate {
            path: "/v2/apps".to_string(),
            ..RequestTemplate::default()
        },
        responses: response_200(json!({"items": "(a,ign)everything"})),
        ..ApiDescriptor::default()
    };

    let expanded = expand_descriptors(&[desc], &[vhost], &Catalog::new()).unwrap();
    let api = &expanded.apis[0];
    assert_eq!(api.request.path, "${apiHost}/v2/apps");
    assert_eq!(api.consumes, vec!["apiHost"]);
}

#[test]
fn duplicate_concrete_names_are_rejected() {
    let make = |name: &str| ApiDescriptor {
        name: name.to_string(),
        request: RequestTemplate {
            path: "/x".to_string(),
            ..RequestTemplate::default()
        },
        responses: response_200(json!({"ok": "(b)flag"})),
        ..ApiDescriptor::default()
    };
    let err = expand_descriptors(&[make("x"), make("x")], &[], &Catalog::new()).unwrap_err();
    assert!(err
        .violations
        .iter()
        .any(|v| v.message.contains("duplicate concrete API name")));
}
