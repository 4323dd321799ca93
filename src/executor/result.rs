use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Outcome of one endpoint call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    status_code: Option<u16>,
    success: bool,
    message: String,
    #[serde(rename = "responseTimeMs", serialize_with = "serialize_millis")]
    elapsed: Duration,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_body: Option<String>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ExecutionResult {
    /// Result for a received HTTP response; success is any 2xx status.
    pub fn from_response(status: u16, reason: &str, elapsed: Duration, raw_body: String) -> Self {
        Self {
            status_code: Some(status),
            success: (200..300).contains(&status),
            message: reason.to_string(),
            elapsed,
            data: parse_payload(&raw_body),
            raw_body: Some(raw_body),
        }
    }

    /// Result for a call that produced a structured payload outside HTTP.
    pub fn completed(
        status: Option<u16>,
        success: bool,
        message: impl Into<String>,
        elapsed: Duration,
        data: Value,
    ) -> Self {
        let raw_body = Some(data.to_string());
        Self {
            status_code: status,
            success,
            message: message.into(),
            elapsed,
            data,
            raw_body,
        }
    }

    /// Result for a call that failed before or while talking to the target.
    pub fn failed(message: impl Into<String>, elapsed: Duration) -> Self {
        let message = message.into();
        Self {
            status_code: None,
            success: false,
            data: json!({ "error": message }),
            message,
            elapsed,
            raw_body: None,
        }
    }

    /// Copy with a different verdict, e.g. a 200 carrying GraphQL errors.
    pub fn with_outcome(&self, success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            ..self.clone()
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn raw_body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }
}

/// `{...}` → object, `[...]` → array, empty → `{}`, anything else stays a string
pub fn parse_payload(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if value.is_object() || value.is_array() {
                return value;
            }
        }
    }
    Value::String(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(" {\"a\": 1} "), json!({"a": 1}));
        assert_eq!(parse_payload("[1,2]"), json!([1, 2]));
        assert_eq!(parse_payload(""), json!({}));
        assert_eq!(parse_payload("OK"), json!("OK"));
        assert_eq!(parse_payload("{broken"), json!("{broken"));
    }

    #[test]
    fn test_from_response_success_is_2xx() {
        let ok = ExecutionResult::from_response(204, "No Content", Duration::ZERO, String::new());
        assert!(ok.is_success());
        assert_eq!(ok.data(), &json!({}));
        let redirect = ExecutionResult::from_response(302, "Found", Duration::ZERO, String::new());
        assert!(!redirect.is_success());
    }

    #[test]
    fn test_failed_result() {
        let r = ExecutionResult::failed("IO Error: refused", Duration::from_millis(3));
        assert!(!r.is_success());
        assert_eq!(r.status_code(), None);
        assert_eq!(r.data(), &json!({"error": "IO Error: refused"}));
    }

    #[test]
    fn test_serialize_shape() {
        let r = ExecutionResult::from_response(200, "OK", Duration::from_millis(12), "{}".into());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["statusCode"], json!(200));
        assert_eq!(v["responseTimeMs"], json!(12));
        assert_eq!(v["success"], json!(true));
    }
}
