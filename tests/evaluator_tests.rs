use flowpilot::evaluator::{evaluate_condition, try_evaluate_condition, ExpressionError};
use flowpilot::VariableEnvironment;
use serde_json::json;

fn env() -> VariableEnvironment {
    VariableEnvironment::from_value(json!({
        "value": "test",
        "count": 5,
        "retries": 2,
        "user": {"name": "alice", "roles": ["admin", "dev"]},
        "items": ["a", "b"],
        "flag": false,
    }))
}

#[test]
fn test_evaluate_equal_condition() {
    assert!(evaluate_condition("value == 'test'", &env()));
    assert!(evaluate_condition("value == \"test\"", &env()));
}

#[test]
fn test_evaluate_not_equal_condition() {
    assert!(evaluate_condition("value != 'other'", &env()));
}

#[test]
fn test_evaluate_cross_type_equality() {
    assert!(evaluate_condition("count == '5'", &env()));
    assert!(evaluate_condition("flag == 'false'", &env()));
}

#[test]
fn test_evaluate_nested_paths() {
    assert!(evaluate_condition("user.name == 'alice'", &env()));
    assert!(evaluate_condition("user.roles[0] == 'admin'", &env()));
    assert!(evaluate_condition("user['name'] == 'alice'", &env()));
    assert!(evaluate_condition("items.1 == 'b'", &env()));
    assert!(evaluate_condition("user.roles[9] == null", &env()));
}

#[test]
fn test_evaluate_arithmetic_and_comparison() {
    assert!(evaluate_condition("(retries + 1) * 2 >= 6", &env()));
    assert!(evaluate_condition("count % 2 == 1", &env()));
    assert!(evaluate_condition("-count < 0", &env()));
    assert!(!evaluate_condition("count / 2 > 3", &env()));
}

#[test]
fn test_evaluate_logical_operators() {
    assert!(evaluate_condition("value == 'test' and retries < 3", &env()));
    assert!(evaluate_condition("flag || count > 1", &env()));
    assert!(evaluate_condition("not flag && !missing", &env()));
    assert!(!evaluate_condition("flag or missing", &env()));
}

#[test]
fn test_missing_variable_is_null() {
    assert!(evaluate_condition("missing == null", &env()));
    assert!(!evaluate_condition("missing", &env()));
}

#[test]
fn test_errors_take_false_branch() {
    assert_eq!(
        try_evaluate_condition("count / 0 > 1", &env()),
        Err(ExpressionError::DivisionByZero)
    );
    assert!(!evaluate_condition("count / 0 > 1", &env()));

    assert!(matches!(
        try_evaluate_condition("value > 3", &env()),
        Err(ExpressionError::Type(_))
    ));
    assert!(matches!(
        try_evaluate_condition("count ==", &env()),
        Err(ExpressionError::Parse(_))
    ));
    assert!(matches!(
        try_evaluate_condition("count # 1", &env()),
        Err(ExpressionError::Lex { .. })
    ));
}

#[test]
fn test_no_side_effects() {
    let env = env();
    let before = env.clone();
    evaluate_condition("count == 5 && user.name != ''", &env);
    assert_eq!(env, before);
}
