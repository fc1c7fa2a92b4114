// Cadence — Parameter redaction
//
// Strips sensitive fields from tool-call parameters before they are retained
// in the usage audit log. Field names are compared case-insensitively with `_`
// and `-` ignored, so `apiKey`, `api_key` and `API-KEY` are one entry.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Field names removed by default.
pub const DEFAULT_REDACTED_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "access_token",
    "refresh_token",
    "secret",
    "client_secret",
    "api_key",
    "apikey",
    "authorization",
    "credential",
];

/// Injectable deny-list of parameter names.
#[derive(Debug, Clone)]
pub struct ParamRedactor {
    denied: HashSet<String>,
}

fn normalize(field: &str) -> String {
    field
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl ParamRedactor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denied: fields.into_iter().map(|f| normalize(f.as_ref())).collect(),
        }
    }

    pub fn is_denied(&self, field: &str) -> bool {
        self.denied.contains(&normalize(field))
    }

    /// Return a copy of `params` with every denied key removed, at any depth.
    pub fn sanitize(&self, params: &Value) -> Value {
        match params {
            Value::Object(map) => {
                let cleaned: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| !self.is_denied(key))
                    .map(|(key, value)| (key.clone(), self.sanitize(value)))
                    .collect();
                Value::Object(cleaned)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            other => other.clone(),
        }
    }
}

impl Default for ParamRedactor {
    fn default() -> Self {
        Self::new(DEFAULT_REDACTED_FIELDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_list_removes_known_fields() {
        let redactor = ParamRedactor::default();
        let cleaned = redactor.sanitize(&json!({
            "query": "scales",
            "password": "hunter2",
            "token": "t",
            "secret": "s",
            "apiKey": "k",
        }));
        assert_eq!(cleaned, json!({ "query": "scales" }));
    }

    #[test]
    fn test_matching_ignores_case_and_separators() {
        let redactor = ParamRedactor::default();
        assert!(redactor.is_denied("API_KEY"));
        assert!(redactor.is_denied("api-key"));
        assert!(redactor.is_denied("RefreshToken"));
        assert!(redactor.is_denied("client-secret"));
        assert!(!redactor.is_denied("course_id"));
    }

    #[test]
    fn test_nested_objects_and_arrays_are_sanitized() {
        let redactor = ParamRedactor::default();
        let cleaned = redactor.sanitize(&json!({
            "spotify": { "access_token": "abc", "playlist": "warmups" },
            "calls": [ { "authorization": "Bearer x", "id": 1 } ],
        }));
        assert_eq!(
            cleaned,
            json!({
                "spotify": { "playlist": "warmups" },
                "calls": [ { "id": 1 } ],
            })
        );
    }

    #[test]
    fn test_custom_list_replaces_defaults() {
        let redactor = ParamRedactor::new(["pin"]);
        let cleaned = redactor.sanitize(&json!({ "pin": "1234", "password": "kept" }));
        assert_eq!(cleaned, json!({ "password": "kept" }));
    }

    #[test]
    fn test_non_object_params_pass_through() {
        let redactor = ParamRedactor::default();
        assert_eq!(redactor.sanitize(&json!("plain")), json!("plain"));
        assert_eq!(redactor.sanitize(&Value::Null), Value::Null);
    }
}
