//! Conservative textual repairs for broken JSON files.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern compiles"));

/// A repair step that was needed to make a file parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    TrailingCommas,
    SingleQuotes,
    BracketBalance,
}

impl RepairStep {
    pub fn describe(&self) -> &'static str {
        match self {
            RepairStep::TrailingCommas => "removed trailing commas",
            RepairStep::SingleQuotes => "replaced single quotes with double quotes",
            RepairStep::BracketBalance => "balanced brackets",
        }
    }
}

/// A successfully repaired document.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    pub steps: Vec<RepairStep>,
}

pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

/// Rewrites `'single quoted'` strings as JSON strings. Text inside double
/// quotes is copied untouched, so apostrophes in values survive.
pub fn double_quote(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        index += 1;
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '\'' => {
                let closing = chars[index..]
                    .iter()
                    .position(|&c| matches!(c, '\'' | '\\' | '\n'))
                    .filter(|&offset| chars[index + offset] == '\'');
                match closing {
                    Some(offset) => {
                        out.push('"');
                        for &inner in &chars[index..index + offset] {
                            if inner == '"' {
                                out.push('\\');
                            }
                            out.push(inner);
                        }
                        out.push('"');
                        index += offset + 1;
                    }
                    None => out.push(ch),
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Drops closers that match nothing and appends the closers still owed at
/// the end of the text. String contents are left alone.
pub fn balance_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut owed: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                owed.push('}');
                out.push(ch);
            }
            '[' => {
                owed.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                if owed.last() == Some(&ch) {
                    owed.pop();
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        out.push('"');
    }
    let mut out = out.trim_end().trim_end_matches(',').to_string();
    while let Some(closer) = owed.pop() {
        out.push(closer);
    }
    out.push('\n');
    out
}

/// Tries the repair steps alone, then in combination, and keeps the first
/// smallest combination whose result parses. A step that leaves the text
/// unchanged is never counted. Returns `None` when the text is beyond repair.
pub fn repair_json(text: &str) -> Option<Repaired> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(Repaired {
            value,
            steps: Vec::new(),
        });
    }

    let stages: [(RepairStep, fn(&str) -> String); 3] = [
        (RepairStep::TrailingCommas, strip_trailing_commas),
        (RepairStep::SingleQuotes, double_quote),
        (RepairStep::BracketBalance, balance_brackets),
    ];
    let mut combinations: Vec<u8> = (1..1 << stages.len()).collect();
    combinations.sort_by_key(|mask| mask.count_ones());

    for mask in combinations {
        let mut current = text.to_string();
        let mut steps = Vec::new();
        let mut effective = true;
        for (bit, (step, apply)) in stages.iter().enumerate() {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let next = apply(&current);
            if next == current {
                effective = false;
                break;
            }
            current = next;
            steps.push(*step);
        }
        if !effective {
            continue;
        }

        // Balancing can expose a comma left before an appended closer.
        let candidate = strip_trailing_commas(&current);
        if candidate != current && !steps.contains(&RepairStep::TrailingCommas) {
            steps.insert(0, RepairStep::TrailingCommas);
        }
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Some(Repaired { value, steps });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trailing_commas_are_removed() {
        let repaired = repair_json(r#"{"a": {"$value": 1,}, }"#).expect("repairable");
        assert_eq!(repaired.value, json!({"a": {"$value": 1}}));
        assert_eq!(repaired.steps, vec![RepairStep::TrailingCommas]);
    }

    #[test]
    fn single_quotes_become_double_quotes() {
        let repaired = repair_json("{'tokenSetOrder': ['core']}").expect("repairable");
        assert_eq!(repaired.value, json!({"tokenSetOrder": ["core"]}));
        assert_eq!(repaired.steps, vec![RepairStep::SingleQuotes]);
    }

    #[test]
    fn missing_closers_are_appended() {
        let repaired = repair_json("{\"color\": {\"red\": {\"$value\": \"#f00\"}").expect("repairable");
        assert_eq!(repaired.value, json!({"color": {"red": {"$value": "#f00"}}}));
        assert_eq!(repaired.steps, vec![RepairStep::BracketBalance]);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        assert_eq!(balance_brackets("{\"a\": \"}]\""), "{\"a\": \"}]\"}\n");
    }

    #[test]
    fn apostrophes_inside_strings_are_kept() {
        let text = "{\"color\": {\"red\": {\"$value\": \"#f00\", \"$description\": \"it's Bob's\"}}";
        assert_eq!(double_quote(text), text);

        let repaired = repair_json(text).expect("repairable");
        assert_eq!(
            repaired.value,
            json!({"color": {"red": {"$value": "#f00", "$description": "it's Bob's"}}})
        );
        assert_eq!(repaired.steps, vec![RepairStep::BracketBalance]);
    }

    #[test]
    fn quoting_and_balancing_combine() {
        let repaired = repair_json("{'a': {\"$value\": \"Bob's\", \"$type\": 'other'}").expect("repairable");
        assert_eq!(repaired.value, json!({"a": {"$value": "Bob's", "$type": "other"}}));
        assert_eq!(
            repaired.steps,
            vec![RepairStep::SingleQuotes, RepairStep::BracketBalance]
        );
    }

    #[test]
    fn hopeless_text_is_not_repaired() {
        assert!(repair_json("not json at all").is_none());
    }
}
