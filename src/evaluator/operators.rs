use std::cmp::Ordering;

use serde_json::Value;

use super::expression::ExpressionError;
use super::type_coercion::{from_f64, is_numeric, to_f64, to_string};

/// Equal 操作符
pub fn equal(value: &Value, target: &Value) -> bool {
    // 相同类型直接比较
    if value == target {
        return true;
    }

    match (value, target) {
        // 数字比较（处理 int vs float）
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        // 字符串与数字比较
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            match s.trim().parse::<f64>() {
                Ok(parsed) => Some(parsed) == n.as_f64(),
                Err(_) => false,
            }
        }
        // 布尔与字符串比较
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            match s.to_lowercase().as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Ordering for `< <= > >=`: numeric when both sides coerce to numbers, lexical for two strings
pub fn compare(value: &Value, target: &Value) -> Result<Ordering, ExpressionError> {
    let numeric = |v: &Value| is_numeric(v) || matches!(v, Value::Bool(_) | Value::Null);
    if numeric(value) && numeric(target) {
        let a = to_f64(value)?;
        let b = to_f64(target)?;
        return a
            .partial_cmp(&b)
            .ok_or_else(|| ExpressionError::Type("Cannot compare NaN".to_string()));
    }
    match (value, target) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::Type(format!(
            "Cannot compare {} with {}",
            value, target
        ))),
    }
}

/// `+`: numeric addition, or concatenation when either side is a non-numeric string
pub fn add(value: &Value, target: &Value) -> Result<Value, ExpressionError> {
    let concat = matches!(value, Value::String(_)) && !is_numeric(value)
        || matches!(target, Value::String(_)) && !is_numeric(target);
    if concat {
        return Ok(Value::String(format!("{}{}", to_string(value), to_string(target))));
    }
    from_f64(to_f64(value)? + to_f64(target)?)
}

pub fn arithmetic(op: char, value: &Value, target: &Value) -> Result<Value, ExpressionError> {
    let a = to_f64(value)?;
    let b = to_f64(target)?;
    match op {
        '-' => from_f64(a - b),
        '*' => from_f64(a * b),
        '/' | '%' if b == 0.0 => Err(ExpressionError::DivisionByZero),
        '/' => from_f64(a / b),
        '%' => from_f64(a % b),
        other => Err(ExpressionError::Type(format!("Unknown operator '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_cross_type() {
        assert!(equal(&json!("42"), &json!(42)));
        assert!(equal(&json!(42), &json!(42.0)));
        assert!(equal(&json!("true"), &json!(true)));
        assert!(!equal(&json!("abc"), &json!(1)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(10), &json!("9")).unwrap(), Ordering::Greater);
        assert_eq!(compare(&json!("abc"), &json!("abd")).unwrap(), Ordering::Less);
        assert!(compare(&json!("abc"), &json!(1)).is_err());
    }

    #[test]
    fn test_add_and_concat() {
        assert_eq!(add(&json!(1), &json!("2")).unwrap(), json!(3));
        assert_eq!(add(&json!("id-"), &json!(7)).unwrap(), json!("id-7"));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            arithmetic('/', &json!(1), &json!(0)),
            Err(ExpressionError::DivisionByZero)
        ));
        assert_eq!(arithmetic('%', &json!(7), &json!(4)).unwrap(), json!(3));
    }
}
