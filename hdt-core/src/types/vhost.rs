use serde_json::Value as JsonValue;

/// A namespace grouping descriptors. The `host_variable`'s runtime value
/// (scheme + authority) prefixes every request path the host owns; `header`
/// carries the static Swagger top-level fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct VirtualHost {
    /// Directory name; set by the loader.
    #[serde(skip)]
    pub name: String,
    pub host_variable: String,
    #[serde(default)]
    pub header: JsonValue,
}
