use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::aideon::tokens::error::{Result, TokenError};
use crate::aideon::tokens::model::CanonicalDocument;

/// Reads and parses a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(TokenError::MissingInput(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

/// Serialises a value the way every file of the repository is written:
/// pretty-printed with two-space indentation and a trailing newline.
pub fn to_pretty_string(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Writes a value to `path`, creating parent directories as needed.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, to_pretty_string(value)?)?;
    Ok(())
}

/// Reads a canonical token document.
pub fn read_canonical(path: &Path) -> Result<CanonicalDocument> {
    let value = read_json(path)?;
    CanonicalDocument::from_value(&value).ok_or_else(|| TokenError::InvalidDocument {
        path: path.to_path_buf(),
        reason: "expected a JSON object at the document root".into(),
    })
}

/// Renders `value` with object keys sorted recursively, so that two values
/// which differ only in key order produce the same string.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Maps a JSON parse failure onto a hint for the person fixing the file.
pub fn parse_error_suggestion(error: &serde_json::Error) -> String {
    let message = error.to_string();
    if message.contains("trailing comma") {
        "Remove the trailing comma before the closing bracket or brace".to_string()
    } else if message.contains("key must be a string") {
        "Object keys must be double-quoted strings; replace single quotes with double quotes"
            .to_string()
    } else if message.contains("EOF while parsing") {
        "The file ends early; check that every '{' and '[' has a matching closing bracket"
            .to_string()
    } else if message.contains("expected value") {
        "Check for trailing commas, single-quoted strings or stray characters".to_string()
    } else {
        format!(
            "Fix the JSON syntax near line {}, column {}",
            error.line(),
            error.column()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_string_ignores_key_order() {
        let lhs = json!({"b": 1, "a": {"y": [1, 2], "x": "s"}});
        let rhs = json!({"a": {"x": "s", "y": [1, 2]}, "b": 1});
        assert_eq!(canonical_string(&lhs), canonical_string(&rhs));
        assert_eq!(canonical_string(&lhs), r#"{"a":{"x":"s","y":[1,2]},"b":1}"#);
    }

    #[test]
    fn trailing_comma_errors_mention_commas() {
        let error = serde_json::from_str::<Value>("{\"a\": 1,}").expect_err("invalid JSON");
        assert!(parse_error_suggestion(&error).contains("trailing comma"));
    }
}
