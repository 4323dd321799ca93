use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::core::variable_pool::VariableEnvironment;
use crate::evaluator::type_coercion::to_string;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex is valid"))
}

/// 替换文本中的 {{name}} 占位符
///
/// Single pass: substituted values are not scanned again. Placeholders whose
/// name is not in `env` are left verbatim.
pub fn resolve_text(text: &str, env: &VariableEnvironment) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            let name = caps[1].trim();
            match env.get(name) {
                Some(value) => to_string(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// 递归替换 JSON 中所有字符串值的占位符（对象的键保持不变）
pub fn resolve_json(value: &Value, env: &VariableEnvironment) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_text(s, env)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_json(v, env)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_json(v, env)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// 提取文本中所有占位符变量名
pub fn extract_placeholders(text: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(text)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}
