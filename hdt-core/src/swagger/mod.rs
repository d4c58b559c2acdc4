use serde_json::{json, Map, Value as JsonValue};

use crate::schema::{self, SchemaError};
use crate::types::{ApiDescriptor, Catalog, VirtualHost};

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("{api}: path variable {var} has no catalogue description")]
    UndefinedPathVariable { api: String, var: String },
    #[error("{api}: {source}")]
    Schema {
        api: String,
        #[source]
        source: SchemaError,
    },
    #[error("virtual host {0}: header must be a JSON object")]
    BadHeader(String),
}

/// Emit one OpenAPI 2.0 document for a virtual host. Private descriptors
/// are omitted; `$var` path segments become `{var}` path parameters whose
/// descriptions come from the catalogue.
pub fn emit_vhost(
    vhost: &VirtualHost,
    descriptors: &[ApiDescriptor],
    catalog: &Catalog,
) -> Result<JsonValue, DocError> {
    let mut doc = Map::new();
    doc.insert("swagger".to_string(), json!("2.0"));
    match &vhost.header {
        JsonValue::Object(header) => {
            for (k, v) in header {
                doc.insert(k.clone(), v.clone());
            }
        }
        JsonValue::Null => {}
        _ => return Err(DocError::BadHeader(vhost.name.clone())),
    }

    let mut paths = Map::new();
    for desc in descriptors {
        if desc.vhost != vhost.name || desc.private {
            continue;
        }
        let normalized = normalize_path(&desc.request.path);
        let operation = operation_for(desc, &normalized, catalog)?;
        let entry = paths
            .entry(normalized)
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(desc.request.method.to_lowercase(), operation);
        }
    }
    doc.insert("paths".to_string(), JsonValue::Object(paths));

    Ok(JsonValue::Object(doc))
}

fn operation_for(
    desc: &ApiDescriptor,
    normalized_path: &str,
    catalog: &Catalog,
) -> Result<JsonValue, DocError> {
    let mut op = Map::new();
    if !desc.tags.is_empty() {
        op.insert("tags".to_string(), json!(desc.tags));
    }

    let primary = desc.responses.values().next();
    let description = desc
        .descr
        .clone()
        .or_else(|| primary.and_then(|r| r.descr.clone()))
        .unwrap_or_default();
    op.insert("description".to_string(), json!(description));

    let mut parameters = Vec::new();
    for var in path_variables(normalized_path) {
        let descr = catalog
            .get(&var)
            .map(|d| d.descr.clone())
            .ok_or_else(|| DocError::UndefinedPathVariable {
                api: desc.name.clone(),
                var: var.clone(),
            })?;
        parameters.push(json!({
            "name": var,
            "in": "path",
            "required": true,
            "type": "string",
            "description": descr,
        }));
    }
    if let Some(body) = &desc.request.body {
        parameters.push(json!({
            "name": "body",
            "in": "body",
            "required": true,
            "schema": body_shape(body, catalog),
        }));
    }
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), JsonValue::Array(parameters));
    }

    let mut responses = Map::new();
    for (status, resp) in &desc.responses {
        let mut entry = Map::new();
        entry.insert(
            "description".to_string(),
            json!(resp.descr.clone().unwrap_or_default()),
        );
        let schema = match (&resp.schema, &resp.body) {
            (Some(s), _) => Some(s.clone()),
            (None, Some(sketch)) => Some(
                schema::translate_sketch(sketch).map_err(|source| DocError::Schema {
                    api: desc.name.clone(),
                    source,
                })?,
            ),
            (None, None) => None,
        };
        if let Some(schema) = schema {
            entry.insert("schema".to_string(), schema);
        }
        responses.insert(status.to_string(), JsonValue::Object(entry));
    }
    op.insert("responses".to_string(), JsonValue::Object(responses));

    Ok(JsonValue::Object(op))
}

/// `$var` and `${var}` path segments become `{var}`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match variable_segment(seg) {
            Some(name) => format!("{{{name}}}"),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn variable_segment(seg: &str) -> Option<&str> {
    let rest = seg.strip_prefix('$')?;
    Some(
        rest.strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(rest),
    )
}

fn path_variables(normalized: &str) -> Vec<String> {
    normalized
        .split('/')
        .filter_map(|seg| {
            seg.strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
                .map(str::to_string)
        })
        .collect()
}

/// Best-effort schema for a request-body template: `$var` leaves are typed
/// as strings and described from the catalogue.
fn body_shape(body: &JsonValue, catalog: &Catalog) -> JsonValue {
    match body {
        JsonValue::String(s) => {
            let mut out = Map::new();
            out.insert("type".to_string(), json!("string"));
            if let Some(name) = whole_reference(s) {
                if let Some(decl) = catalog.get(name) {
                    out.insert("description".to_string(), json!(decl.descr));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Bool(_) => json!({"type": "boolean"}),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => json!({"type": "integer"}),
        JsonValue::Number(_) => json!({"type": "number"}),
        JsonValue::Null => json!({}),
        JsonValue::Array(items) => {
            let items_schema = items
                .first()
                .map(|i| body_shape(i, catalog))
                .unwrap_or_else(|| json!({}));
            json!({"type": "array", "items": items_schema})
        }
        JsonValue::Object(map) => {
            let properties: Map<String, JsonValue> = map
                .iter()
                .map(|(k, v)| (k.clone(), body_shape(v, catalog)))
                .collect();
            json!({"type": "object", "properties": properties})
        }
    }
}

fn whole_reference(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('$')?;
    let name = rest
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(rest);
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        .then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_variable_segments() {
        assert_eq!(normalize_path("/v2/apps/$appGuid"), "/v2/apps/{appGuid}");
        assert_eq!(normalize_path("/v2/apps/${appGuid}"), "/v2/apps/{appGuid}");
        assert_eq!(normalize_path("/v2/apps"), "/v2/apps");
    }
}
