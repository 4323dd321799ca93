use serde_json::{Map, Value};

pub const SLEEP_KEY: &str = "sleep";
pub const INJECT_KEY: &str = "inject";
pub const EXTRACT_KEY: &str = "extract";

/// Pre/post processor directives attached to a step.
///
/// Built from the JSON object submitted with the step. Unknown keys are kept in
/// the raw map but otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    raw: Map<String, Value>,
    sleep_ms: Option<u64>,
    inject: Option<Map<String, Value>>,
    extract: Vec<(String, String)>,
}

impl Directives {
    /// Strict parse, used when a flow is configured.
    pub fn parse(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("processor must be an object, got {}", type_name(value)))?;
        Self::build(map, true)
    }

    /// Lenient parse: malformed directives are logged and dropped.
    pub fn parse_lenient(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self::build(map, false).unwrap_or_default(),
            None => {
                tracing::warn!(kind = type_name(value), "Ignoring non-object processor");
                Self::default()
            }
        }
    }

    fn build(map: &Map<String, Value>, strict: bool) -> Result<Self, String> {
        let mut directives = Directives {
            raw: map.clone(),
            ..Default::default()
        };

        if let Some(sleep) = map.get(SLEEP_KEY) {
            match parse_sleep(sleep) {
                Ok(ms) => directives.sleep_ms = Some(ms),
                Err(e) if strict => return Err(e),
                Err(e) => tracing::warn!(error = %e, "Ignoring sleep directive"),
            }
        }

        if let Some(inject) = map.get(INJECT_KEY) {
            match inject {
                Value::Object(values) => directives.inject = Some(values.clone()),
                Value::Null => {}
                other => {
                    let e = format!("inject must be an object, got {}", type_name(other));
                    if strict {
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "Ignoring inject directive");
                }
            }
        }

        if let Some(extract) = map.get(EXTRACT_KEY) {
            match extract {
                Value::Object(paths) => {
                    for (target, path) in paths {
                        match path.as_str() {
                            Some(path) => directives.extract.push((target.clone(), path.to_string())),
                            None => {
                                let e = format!("extract path for '{}' must be a string", target);
                                if strict {
                                    return Err(e);
                                }
                                tracing::warn!(error = %e, "Ignoring extract entry");
                            }
                        }
                    }
                }
                Value::Null => {}
                other => {
                    let e = format!("extract must be an object, got {}", type_name(other));
                    if strict {
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "Ignoring extract directive");
                }
            }
        }

        Ok(directives)
    }

    pub fn sleep_ms(&self) -> Option<u64> {
        self.sleep_ms
    }

    pub fn inject(&self) -> Option<&Map<String, Value>> {
        self.inject.as_ref()
    }

    /// `(target variable, response path)` pairs in submission order.
    pub fn extract(&self) -> &[(String, String)] {
        &self.extract
    }

    pub fn is_empty(&self) -> bool {
        self.sleep_ms.is_none() && self.inject.is_none() && self.extract.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

fn parse_sleep(value: &Value) -> Result<u64, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("sleep must be a non-negative integer, got {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("sleep must be a non-negative integer, got '{}'", s)),
        other => Err(format!(
            "sleep must be a non-negative integer, got {}",
            type_name(other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
