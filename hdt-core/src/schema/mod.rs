use std::collections::BTreeMap;

use serde_json::{json, Map, Value as JsonValue};

use crate::expand::ACTION_KEYS;
use crate::paths::{DataPath, PathSeg};

/// Translate a body sketch into its JSON Schema documentation form.
/// `required` flags are collected into canonical `required: […]` arrays on
/// the owning object; fields flagged `ign` carry `x-ignore: true` (see
/// [`validation_form`]).
pub fn translate_sketch(sketch: &JsonValue) -> Result<JsonValue, SchemaError> {
    let (schema, _required) = node(sketch)?;
    Ok(schema)
}

/// Strip documentation-only markers for response validation: every subschema
/// flagged `x-ignore` becomes the empty (accept-all) schema.
pub fn validation_form(schema: &JsonValue) -> JsonValue {
    match schema {
        JsonValue::Object(map) => {
            if map.get("x-ignore").and_then(JsonValue::as_bool) == Some(true) {
                return json!({});
            }
            JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), validation_form(v)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(validation_form).collect()),
        other => other.clone(),
    }
}

/// Deep-merge `bodymd` fragments into the translated schema at their dotted
/// paths. An `anyOf` overlay erases the sketched `type`.
pub fn apply_bodymd(
    schema: &mut JsonValue,
    overlay: &BTreeMap<String, JsonValue>,
) -> Result<(), SchemaError> {
    for (path, fragment) in overlay {
        let parsed =
            DataPath::parse(path).map_err(|e| SchemaError::BadOverlayPath(e.to_string()))?;
        let target = navigate(schema, &parsed)
            .ok_or_else(|| SchemaError::OverlayTargetMissing(path.clone()))?;
        deep_merge(target, fragment);
    }
    Ok(())
}

fn navigate<'a>(schema: &'a mut JsonValue, path: &DataPath) -> Option<&'a mut JsonValue> {
    let mut cur = schema;
    for seg in &path.segs {
        cur = match seg {
            PathSeg::Field(name) => cur.get_mut("properties")?.get_mut(name)?,
            PathSeg::Every | PathSeg::Index(_) => cur.get_mut("items")?,
        };
    }
    Some(cur)
}

fn deep_merge(target: &mut JsonValue, fragment: &JsonValue) {
    let JsonValue::Object(frag) = fragment else {
        *target = fragment.clone();
        return;
    };
    if !target.is_object() {
        *target = JsonValue::Object(Map::new());
    }
    if frag.contains_key("anyOf") {
        if let Some(obj) = target.as_object_mut() {
            obj.remove("type");
        }
    }
    let obj = target.as_object_mut().expect("target coerced to object");
    for (k, v) in frag {
        match obj.get_mut(k) {
            Some(existing) if existing.is_object() && v.is_object() => deep_merge(existing, v),
            _ => {
                obj.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Translate one sketch node; the bool is the field's required flag for the
/// owning object.
fn node(sketch: &JsonValue) -> Result<(JsonValue, bool), SchemaError> {
    match sketch {
        JsonValue::String(s) => doc_info(s, "s"),
        JsonValue::Array(items) => match items.len() {
            1 => {
                let (item_schema, _) = node(&items[0])?;
                Ok((json!({"type": "array", "items": item_schema}), true))
            }
            2 => {
                let JsonValue::String(meta) = &items[0] else {
                    return Err(SchemaError::BadArrayMeta);
                };
                let (mut schema, required) = doc_info(meta, "a")?;
                let (item_schema, _) = node(&items[1])?;
                schema
                    .as_object_mut()
                    .expect("doc_info yields an object")
                    .insert("items".to_string(), item_schema);
                Ok((schema, required))
            }
            n => Err(SchemaError::BadArraySketch(n)),
        },
        JsonValue::Object(map) => object_node(map),
        other => Err(SchemaError::BadSketchValue(other.to_string())),
    }
}

fn object_node(map: &Map<String, JsonValue>) -> Result<(JsonValue, bool), SchemaError> {
    // `{"*": S}` — open map of uniform values.
    if map.len() == 1 {
        if let Some(value) = map.get("*") {
            let (value_schema, _) = node(value)?;
            return Ok((json!({"patternProperties": {"^.+$": value_schema}}), true));
        }
    }

    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));
    let mut required_flag = true;

    if let Some(meta) = map.get("__") {
        let JsonValue::String(meta) = meta else {
            return Err(SchemaError::BadObjectMeta);
        };
        let (meta_schema, meta_required) = doc_info(meta, "o")?;
        required_flag = meta_required;
        if let JsonValue::Object(meta_obj) = meta_schema {
            for (k, v) in meta_obj {
                out.insert(k, v);
            }
        }
    }

    let mut properties = Map::new();
    let mut required_names = Vec::new();
    for (key, value) in map {
        if key == "__" || ACTION_KEYS.contains(&key.as_str()) {
            continue;
        }
        let (child, child_required) = node(value)?;
        if child_required {
            required_names.push(JsonValue::String(key.clone()));
        }
        properties.insert(key.clone(), child);
    }

    if !properties.is_empty() {
        out.insert("properties".to_string(), JsonValue::Object(properties));
    }
    if !required_names.is_empty() {
        out.insert("required".to_string(), JsonValue::Array(required_names));
    }

    Ok((JsonValue::Object(out), required_flag))
}

/// Parse a `"(flags)description"` (or plain description) leaf into a schema
/// and its required flag.
fn doc_info(s: &str, default_type: &str) -> Result<(JsonValue, bool), SchemaError> {
    let (flags, descr) = match s.strip_prefix('(') {
        Some(rest) => match rest.split_once(')') {
            Some((flags, descr)) => (flags, descr),
            None => ("", s),
        },
        None => ("", s),
    };

    let mut ty = type_for_flag(default_type).unwrap_or("string");
    let mut items_type = items_for_flag(default_type);
    let mut format = None;
    let mut required = true;
    let mut optional = false;
    let mut ignore = false;

    if !flags.is_empty() {
        for flag in flags.split(',') {
            let flag = flag.trim();
            match flag {
                "opt" => {
                    required = false;
                    optional = true;
                }
                "req" => required = true,
                "ign" => ignore = true,
                "dt" | "dts" => {
                    ty = "string";
                    format = Some("date-time");
                }
                _ => {
                    ty = type_for_flag(flag).ok_or_else(|| {
                        SchemaError::UnknownFlag(flag.to_string())
                    })?;
                    items_type = items_for_flag(flag);
                }
            }
        }
    }

    let mut out = Map::new();
    if optional {
        out.insert("type".to_string(), json!([ty, "null"]));
    } else {
        out.insert("type".to_string(), json!(ty));
    }
    if let Some(format) = format {
        out.insert("format".to_string(), json!(format));
    }
    if let Some(items_type) = items_type {
        out.insert("items".to_string(), json!({ "type": items_type }));
    }
    if !descr.is_empty() {
        out.insert("description".to_string(), json!(descr));
    }
    if ignore {
        out.insert("x-ignore".to_string(), json!(true));
    }

    Ok((JsonValue::Object(out), required))
}

fn type_for_flag(flag: &str) -> Option<&'static str> {
    match flag {
        "a" | "ba" | "ia" | "sa" => Some("array"),
        "b" => Some("boolean"),
        "i" => Some("integer"),
        "o" => Some("object"),
        "s" => Some("string"),
        _ => None,
    }
}

fn items_for_flag(flag: &str) -> Option<&'static str> {
    match flag {
        "ba" => Some("boolean"),
        "ia" => Some("integer"),
        "sa" => Some("string"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("array sketch must have 1 or 2 elements, got {0}")]
    BadArraySketch(usize),
    #[error("array sketch metadata must be a string")]
    BadArrayMeta,
    #[error("object __ metadata must be a string")]
    BadObjectMeta,
    #[error("unsupported sketch value: {0}")]
    BadSketchValue(String),
    #[error("unknown sketch flag: {0}")]
    UnknownFlag(String),
    #[error("invalid bodymd path: {0}")]
    BadOverlayPath(String),
    #[error("bodymd path {0} does not match a sketched node")]
    OverlayTargetMissing(String),
}
