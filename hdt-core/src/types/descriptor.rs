use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::types::{HookDecls, RequestTemplate};

/// One declared API: a request template plus one response descriptor per
/// expected status code. Expansion (not this type) turns it into the
/// planner's Concrete APIs.
#[derive(Debug, Clone, Default)]
pub struct ApiDescriptor {
    /// Qualified `<vhost>/<name>`.
    pub name: String,
    pub vhost: String,
    pub descr: Option<String>,
    /// Excluded from generated documentation (still planned and run).
    pub private: bool,
    pub request: RequestTemplate,
    pub tags: Vec<String>,
    /// Name-prefix matchers this API belongs to, for `--tests` filtering.
    pub groups: Vec<String>,
    /// Extra consumed variable names beyond those scanned from the request.
    pub consumes: Vec<String>,
    /// Extra produced variable names beyond those scanned from actions.
    pub produces: Vec<String>,
    pub hooks: HookDecls,
    pub responses: BTreeMap<u16, ResponseDescriptor>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ResponseDescriptor {
    #[serde(default)]
    pub descr: Option<String>,
    /// Raw JSON Schema; takes precedence over `body`.
    #[serde(default)]
    pub schema: Option<JsonValue>,
    /// Body sketch (friendly schema shorthand, also scanned for actions).
    #[serde(default)]
    pub body: Option<JsonValue>,
    /// Dotted-path → schema fragment overlay, deep-merged after translation.
    #[serde(default)]
    pub bodymd: Option<BTreeMap<String, JsonValue>>,
    #[serde(default)]
    pub ignore_body: bool,
    /// Explicit test variants; absent means one default test.
    #[serde(default)]
    pub tests: Option<Vec<TestSpec>>,
    /// Overrides the constructor's default serialization keys.
    #[serde(default)]
    pub serial_vars: Option<Vec<String>>,
    #[serde(flatten)]
    pub hooks: HookDecls,
}

/// One test variant of a response: variable overrides ground into the
/// request at expansion time to force this status.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TestSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, JsonValue>,
    #[serde(flatten)]
    pub hooks: HookDecls,
    /// Anything else declared on the test; scanned for action keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}
