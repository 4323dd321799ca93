use serde_json::{Number, Value};

use super::expression::ExpressionError;

/// 将 Value 转换为 f64
pub fn to_f64(value: &Value) -> Result<f64, ExpressionError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExpressionError::Type("Cannot convert number to f64".to_string())),
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| {
            ExpressionError::Type(format!("Cannot convert '{}' to number: {}", s, e))
        }),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        _ => Err(ExpressionError::Type(format!(
            "Cannot convert {} to number",
            value
        ))),
    }
}

/// f64 → JSON number, keeping integral results as integers
pub fn from_f64(n: f64) -> Result<Value, ExpressionError> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Type(format!("Result is not a finite number: {}", n)))
}

/// 将 Value 转换为字符串
pub fn to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "".to_string(),
        other => other.to_string(),
    }
}

/// Truthiness used by `&&`, `||`, `!` and the final branch decision
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}
