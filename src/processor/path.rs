use serde_json::Value;

/// Normalise `a.b[0].c` into `["a", "b", "0", "c"]`.
///
/// A blank path, or one with an empty segment (`a..b`, `[0]`, `a.`), has no
/// segments to walk and yields `None`.
pub fn split_path(path: &str) -> Option<Vec<String>> {
    if path.trim().is_empty() {
        return None;
    }
    path.replace('[', ".")
        .replace(']', "")
        .split('.')
        .map(str::trim)
        .map(|s| (!s.is_empty()).then(|| s.to_string()))
        .collect()
}

/// Resolve a dotted/indexed path against a response payload.
///
/// Objects are walked by key, arrays by non-negative in-bounds index. Any miss
/// yields `None`. A JSON `null` at the end of the path also yields `None`, as
/// does a path that [`split_path`] rejects.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in split_path(path)? {
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a.b[0].c").unwrap(), vec!["a", "b", "0", "c"]);
        assert_eq!(split_path(" a . b ").unwrap(), vec!["a", "b"]);
        assert_eq!(split_path(""), None);
        assert_eq!(split_path("   "), None);
        assert_eq!(split_path("a..b"), None);
        assert_eq!(split_path("a."), None);
        assert_eq!(split_path("[2]"), None);
    }

    #[test]
    fn test_resolve_path() {
        let data = json!({"user": {"tags": ["a", "b"], "name": null}, "list": [{"id": 3}]});
        assert_eq!(resolve_path(&data, "user.tags[1]"), Some(&json!("b")));
        assert_eq!(resolve_path(&data, "list[0].id"), Some(&json!(3)));
        assert_eq!(resolve_path(&data, "user.tags[5]"), None);
        assert_eq!(resolve_path(&data, "user.tags[-1]"), None);
        assert_eq!(resolve_path(&data, "user.name"), None);
        assert_eq!(resolve_path(&data, "user.tags.x"), None);
        assert_eq!(resolve_path(&data, "user.tags[0].deep"), None);
    }

    #[test]
    fn test_blank_or_gapped_path_misses() {
        let data = json!({"a": {"b": 1}});
        assert_eq!(resolve_path(&data, ""), None);
        assert_eq!(resolve_path(&data, " "), None);
        assert_eq!(resolve_path(&data, "a..b"), None);
        assert_eq!(resolve_path(&data, ".a.b"), None);
        assert_eq!(resolve_path(&data, "a.b"), Some(&json!(1)));
    }
}
