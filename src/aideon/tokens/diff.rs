//! Deep structural comparison of JSON documents.

use serde_json::Value;

use crate::aideon::tokens::io::json::canonical_string;
use crate::aideon::tokens::model::join_path;

/// One difference between an expected and an actual document.
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    MissingKey { path: String, expected: Value },
    ExtraKey { path: String, actual: Value },
    ValueMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },
}

impl Difference {
    pub fn path(&self) -> &str {
        match self {
            Difference::MissingKey { path, .. }
            | Difference::ExtraKey { path, .. }
            | Difference::ValueMismatch { path, .. } => path,
        }
    }
}

/// Compares two values key by key. Objects are descended into; everything
/// else, arrays included, is compared through its canonical JSON string so
/// that key order never counts as a difference.
pub fn diff_values(expected: &Value, actual: &Value) -> Vec<Difference> {
    let mut differences = Vec::new();
    diff_at("", expected, actual, &mut differences);
    differences
}

fn diff_at(path: &str, expected: &Value, actual: &Value, out: &mut Vec<Difference>) {
    match (expected, actual) {
        (Value::Object(lhs), Value::Object(rhs)) => {
            for (key, value) in lhs {
                let child = join_path(path, key);
                match rhs.get(key) {
                    Some(other) => diff_at(&child, value, other, out),
                    None => out.push(Difference::MissingKey {
                        path: child,
                        expected: value.clone(),
                    }),
                }
            }
            for (key, value) in rhs {
                if !lhs.contains_key(key) {
                    out.push(Difference::ExtraKey {
                        path: join_path(path, key),
                        actual: value.clone(),
                    });
                }
            }
        }
        _ => {
            if canonical_string(expected) != canonical_string(actual) {
                out.push(Difference::ValueMismatch {
                    path: path.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_missing_extra_and_mismatched_keys() {
        let expected = json!({"a": {"x": 1, "y": 2}, "b": [1, 2]});
        let actual = json!({"a": {"x": 1, "z": 3}, "b": [2, 1]});
        let differences = diff_values(&expected, &actual);
        assert_eq!(
            differences,
            vec![
                Difference::MissingKey { path: "a.y".into(), expected: json!(2) },
                Difference::ExtraKey { path: "a.z".into(), actual: json!(3) },
                Difference::ValueMismatch {
                    path: "b".into(),
                    expected: json!([1, 2]),
                    actual: json!([2, 1]),
                },
            ]
        );
    }

    #[test]
    fn key_order_is_not_a_difference() {
        let expected = json!({"v": {"fontFamily": "Inter", "fontSize": 12}});
        let actual = json!({"v": {"fontSize": 12, "fontFamily": "Inter"}});
        assert!(diff_values(&expected, &actual).is_empty());
    }
}
