use crate::core::variable_pool::VariableEnvironment;

use super::expression::{parse_expression, ExpressionError};
use super::type_coercion::is_truthy;

/// Evaluate a branch condition to a boolean.
pub fn try_evaluate_condition(
    condition: &str,
    env: &VariableEnvironment,
) -> Result<bool, ExpressionError> {
    let expr = parse_expression(condition)?;
    Ok(is_truthy(&expr.evaluate(env)?))
}

/// Evaluate a branch condition; parse and type errors count as `false`.
pub fn evaluate_condition(condition: &str, env: &VariableEnvironment) -> bool {
    match try_evaluate_condition(condition, env) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(condition, error = %e, "Condition evaluation failed, taking false branch");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluate_condition() {
        let env = VariableEnvironment::from_value(json!({"token": "abc", "retries": 2}));
        assert!(evaluate_condition("token != null && retries < 3", &env));
        assert!(!evaluate_condition("retries > 5", &env));
        assert!(evaluate_condition("token", &env));
        assert!(!evaluate_condition("missing", &env));
    }

    #[test]
    fn test_errors_are_false() {
        let env = VariableEnvironment::new();
        assert!(!evaluate_condition("1 +", &env));
        assert!(!evaluate_condition("'a' > 1", &env));
        assert!(try_evaluate_condition("1 +", &env).is_err());
    }

    #[test]
    fn test_deterministic() {
        let env = VariableEnvironment::from_value(json!({"n": 4}));
        let first = evaluate_condition("n % 2 == 0", &env);
        for _ in 0..10 {
            assert_eq!(evaluate_condition("n % 2 == 0", &env), first);
        }
    }
}
