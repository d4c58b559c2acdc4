use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as JsonValue;

use crate::error::Violation;
use crate::paths::DataPath;
use crate::types::{Action, ValueSource, VarNew, VarSet};

/// Sketch keys recognized as response-time actions rather than schema
/// properties.
pub(crate) const ACTION_KEYS: [&str; 4] = ["var_set", "var_new", "var_rename", "var_delete"];

#[derive(Default)]
pub(crate) struct ScanOutcome {
    pub actions: Vec<Action>,
    pub var_new: Option<VarNew>,
    pub referenced: BTreeSet<String>,
    pub violations: Vec<Violation>,
}

/// Walk the response body sketch and the test object, collecting declared
/// actions with their default extraction paths.
pub(crate) fn scan_actions(
    api: &str,
    vhost: &str,
    body: Option<&JsonValue>,
    test_extra: &BTreeMap<String, JsonValue>,
    default_serial: &[String],
) -> ScanOutcome {
    let mut scan = Scan {
        api,
        vhost,
        default_serial,
        out: ScanOutcome::default(),
    };
    if let Some(body) = body {
        scan.walk(body, DataPath::root());
    }
    for (key, value) in test_extra {
        scan.try_action(key, value, DataPath::root());
    }
    scan.out
}

struct Scan<'a> {
    api: &'a str,
    vhost: &'a str,
    default_serial: &'a [String],
    out: ScanOutcome,
}

impl Scan<'_> {
    fn walk(&mut self, value: &JsonValue, path: DataPath) {
        match value {
            JsonValue::Object(map) => {
                for (key, child) in map {
                    if self.try_action(key, child, path.clone()) {
                        continue;
                    }
                    if key == "__" {
                        continue;
                    }
                    self.walk(child, path.child(key));
                }
            }
            JsonValue::Array(items) => {
                // Sketch arrays are `[S]` or `[meta, S]`; the element schema
                // is the last entry either way.
                if let Some(last) = items.last() {
                    self.walk(last, path.every());
                }
            }
            _ => {}
        }
    }

    /// Returns true when the key was a recognized action.
    fn try_action(&mut self, key: &str, value: &JsonValue, path: DataPath) -> bool {
        match key {
            "var_set" => self.var_set(value, path),
            "var_new" => self.var_new(value, path),
            "var_rename" => self.var_rename(value),
            "var_delete" => self.var_delete(value),
            _ => return false,
        }
        true
    }

    fn var_set(&mut self, value: &JsonValue, scan_path: DataPath) {
        let Some(name) = str_field(value, "name") else {
            self.violation("var_set requires a name");
            return;
        };
        let Some(source) = self.value_source(value, scan_path) else {
            return;
        };
        self.out.actions.push(Action::Set(VarSet {
            name: name.to_string(),
            source,
        }));
    }

    fn var_new(&mut self, value: &JsonValue, scan_path: DataPath) {
        let Some(name) = str_field(value, "name") else {
            self.violation("var_new requires a name");
            return;
        };
        let (Some(get), Some(delete)) = (str_field(value, "get"), str_field(value, "delete"))
        else {
            self.violation("var_new requires get and delete peer names");
            return;
        };
        if self.out.var_new.is_some() {
            self.violation("at most one var_new per concrete API");
            return;
        }
        let Some(source) = self.value_source(value, scan_path) else {
            return;
        };

        let serial_vars = match value.get("serial_vars") {
            Some(v) => match string_list(v) {
                Some(list) => list,
                None => {
                    self.violation("var_new.serial_vars must be a list of variable names");
                    return;
                }
            },
            None => self.default_serial.to_vec(),
        };
        if serial_vars.is_empty() {
            self.violation("var_new has no resolvable serial_vars");
        }

        let get = self.qualify(get);
        let delete = self.qualify(delete);
        self.out.referenced.insert(get.clone());
        self.out.referenced.insert(delete.clone());

        let var_new = VarNew {
            name: name.to_string(),
            source,
            get,
            delete,
            serial_vars,
        };
        self.out.var_new = Some(var_new.clone());
        self.out.actions.push(Action::New(var_new));
    }

    fn var_rename(&mut self, value: &JsonValue) {
        let (Some(from), Some(to)) = (str_field(value, "from"), str_field(value, "to")) else {
            self.violation("var_rename requires from and to");
            return;
        };
        self.out.actions.push(Action::Rename {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn var_delete(&mut self, value: &JsonValue) {
        let Some(name) = value.as_str() else {
            self.violation("var_delete requires a variable name");
            return;
        };
        self.out.actions.push(Action::Delete(name.to_string()));
    }

    fn value_source(&mut self, value: &JsonValue, scan_path: DataPath) -> Option<ValueSource> {
        if let Some(v) = value.get("value") {
            return Some(ValueSource::Value(v.clone()));
        }
        match value.get("path") {
            Some(JsonValue::String(p)) => match DataPath::parse(p) {
                Ok(path) => Some(ValueSource::Path(path)),
                Err(e) => {
                    self.violation(format!("invalid extraction path {p:?}: {e}"));
                    None
                }
            },
            Some(_) => {
                self.violation("path must be a string");
                None
            }
            None => Some(ValueSource::Path(scan_path)),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if name.contains('/') || self.vhost.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.vhost, name)
        }
    }

    fn violation(&mut self, message: impl Into<String>) {
        self.out
            .violations
            .push(Violation::new(self.api, message.into()));
    }
}

fn str_field<'a>(value: &'a JsonValue, field: &str) -> Option<&'a str> {
    value.get(field).and_then(JsonValue::as_str)
}

fn string_list(value: &JsonValue) -> Option<Vec<String>> {
    value.as_array().and_then(|items| {
        items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}
