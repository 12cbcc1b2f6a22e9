use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(#([0-9a-f]{3}|[0-9a-f]{4}|[0-9a-f]{6}|[0-9a-f]{8})|(rgb|rgba|hsl|hsla)\s*\(.*\))$",
    )
    .expect("color pattern compiles")
});

static DIMENSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-?(\d+(\.\d+)?|\.\d+)\s*(px|rem|em|%|vh|vw|vmin|vmax|pt|dp|sp|ch|ex|s|ms)$")
        .expect("dimension pattern compiles")
});

/// Token types the inference heuristic can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Color,
    Dimension,
    Typography,
    Other,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Color => "color",
            TokenType::Dimension => "dimension",
            TokenType::Typography => "typography",
            TokenType::Other => "other",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guesses a token type from the shape of its value.
///
/// Hex, `rgb()` and `hsl()` strings are colors; numbers and numeric strings
/// with a unit are dimensions; objects with a `fontFamily` property are
/// typography; everything else is `other`.
pub fn infer_type(value: &Value) -> TokenType {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if COLOR_PATTERN.is_match(text) {
                TokenType::Color
            } else if DIMENSION_PATTERN.is_match(text) {
                TokenType::Dimension
            } else {
                TokenType::Other
            }
        }
        Value::Number(_) => TokenType::Dimension,
        Value::Object(map) if map.contains_key("fontFamily") => TokenType::Typography,
        _ => TokenType::Other,
    }
}
