use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BasicAuth {
    pub user: String,
    pub pass: String,
}

/// An HTTP request with `$var` placeholders still symbolic. The path is
/// prefixed with the owning virtual host's `${host_variable}` during
/// expansion, so a fully substituted path is an absolute URL.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestTemplate {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
    /// Per-request timeout in milliseconds; overrides the system default.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: String::new(),
            headers: BTreeMap::new(),
            auth: None,
            body: None,
            timeout_ms: None,
        }
    }
}
