use hdt_core::expand::ConcreteApi;
use hdt_core::schema::validation_form;
use serde_json::Value as JsonValue;

use super::http::HttpResponse;
use super::result::ExecError;

/// Check status, content type and body schema; returns the parsed JSON body
/// when the response carried one.
pub(crate) fn validate_response(
    api: &ConcreteApi,
    resp: &HttpResponse,
) -> Result<Option<JsonValue>, ExecError> {
    if resp.status != api.expected_status {
        return Err(ExecError::UnexpectedStatus {
            expected: api.expected_status,
            actual: resp.status,
        });
    }

    let body_json = if resp.is_json() {
        match serde_json::from_slice::<JsonValue>(&resp.body) {
            Ok(v) => Some(v),
            Err(e) => return Err(ExecError::BadJson(e.to_string())),
        }
    } else {
        None
    };

    if api.ignore_body {
        return Ok(body_json);
    }

    if let Some(schema) = &api.response_schema {
        let lenient = validation_form(schema);
        let validator = jsonschema::validator_for(&lenient)
            .map_err(|e| ExecError::SchemaValidation(vec![e.to_string()]))?;
        let instance = body_json.clone().unwrap_or(JsonValue::Null);
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|err| format!("{}: {}", err.instance_path, err))
            .collect();
        if !errors.is_empty() {
            return Err(ExecError::SchemaValidation(errors));
        }
    }

    Ok(body_json)
}
