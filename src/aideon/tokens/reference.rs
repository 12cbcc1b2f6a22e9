//! Parsing and resolution of `{dot.separated.path}` references.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::aideon::tokens::error::{Result, TokenError};
use crate::aideon::tokens::model::{TokenLeaf, TokenSets};

static WHOLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([^{}]+)\}$").expect("reference pattern compiles"));

static EMBEDDED_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]+\}").expect("embedded reference pattern compiles"));

static NUMERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)-(\d+)$").expect("suffix pattern compiles"));

/// Singular/plural spellings of group names used by older token files.
const GROUP_ALIASES: &[(&str, &str)] = &[
    ("color", "colors"),
    ("fontWeight", "fontWeights"),
    ("lineHeight", "lineHeights"),
    ("fontSize", "fontSizes"),
    ("fontFamily", "fontFamilies"),
    ("letterSpacing", "letterSpacings"),
    ("spacing", "spacings"),
    ("size", "sizes"),
    ("shadow", "shadows"),
    ("radius", "radii"),
    ("opacity", "opacities"),
];

const FONT_WEIGHT_NAMES: &[(&str, &str)] = &[
    ("100", "thin"),
    ("200", "extralight"),
    ("300", "light"),
    ("400", "regular"),
    ("500", "medium"),
    ("600", "semibold"),
    ("700", "bold"),
    ("800", "extrabold"),
    ("900", "black"),
];

const LINE_HEIGHT_NAMES: &[(&str, &str)] = &[
    ("0", "none"),
    ("1", "tight"),
    ("2", "snug"),
    ("3", "normal"),
    ("4", "relaxed"),
    ("5", "loose"),
];

/// Chained references are followed at most this many times.
const MAX_CHAIN_DEPTH: usize = 16;

/// A parsed reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    raw: String,
    segments: Vec<String>,
}

impl Reference {
    /// Parses a string of the form `{a.b.c}`.
    pub fn parse(text: &str) -> Result<Self> {
        let captures = WHOLE_REFERENCE
            .captures(text.trim())
            .ok_or_else(|| TokenError::InvalidReference(text.to_string()))?;
        let segments: Vec<String> = captures[1].split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TokenError::InvalidReference(text.to_string()));
        }
        Ok(Self {
            raw: text.trim().to_string(),
            segments,
        })
    }

    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let segments: Vec<String> = segments.iter().map(|s| s.as_ref().to_string()).collect();
        Self {
            raw: format!("{{{}}}", segments.join(".")),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Dotted path without braces.
    pub fn path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Returns `true` when the whole string is a single reference.
pub fn is_reference(text: &str) -> bool {
    WHOLE_REFERENCE.is_match(text.trim())
}

/// Every `{...}` occurrence in a string, including references embedded in
/// expressions such as `{spacing.base} * 2`.
pub fn find_references(text: &str) -> Vec<String> {
    EMBEDDED_REFERENCE
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}

/// Every reference string found anywhere inside a token value.
pub fn value_references(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_value_references(value, &mut found);
    found
}

fn collect_value_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.extend(find_references(text)),
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_value_references(item, out)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_value_references(item, out)),
        _ => {}
    }
}

/// The token a reference points at.
#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub set: &'a str,
    /// Path inside the set, without the set name.
    pub path: String,
    pub leaf: &'a TokenLeaf,
}

impl Target<'_> {
    /// Path qualified with the owning set name.
    pub fn qualified_path(&self) -> String {
        format!("{}.{}", self.set, self.path)
    }
}

/// Outcome of resolving a reference.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    /// The path names a token directly.
    Resolved(Target<'a>),
    /// The path only matched after a legacy alias rewrite.
    Compatible {
        target: Target<'a>,
        alias: String,
        warning: String,
    },
    Unresolved { suggestion: String },
}

impl<'a> Resolution<'a> {
    pub fn target(&self) -> Option<&Target<'a>> {
        match self {
            Resolution::Resolved(target) | Resolution::Compatible { target, .. } => Some(target),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target().is_some()
    }
}

/// Resolves references against the sets loaded for one operation.
pub struct Resolver<'a> {
    sets: &'a TokenSets,
}

impl<'a> Resolver<'a> {
    pub fn new(sets: &'a TokenSets) -> Self {
        Self { sets }
    }

    /// Parses and resolves a reference string.
    pub fn resolve_str(&self, text: &str) -> Result<Resolution<'a>> {
        Ok(self.resolve(&Reference::parse(text)?))
    }

    /// Resolves a reference. Sets are scanned in load order and the first set
    /// containing the full path wins.
    pub fn resolve(&self, reference: &Reference) -> Resolution<'a> {
        if let Some(target) = self.lookup(reference.segments()) {
            return Resolution::Resolved(target);
        }

        for (candidate, note) in alias_candidates(reference.segments()) {
            if let Some(target) = self.lookup(&candidate) {
                let alias = Reference::from_segments(&candidate);
                return Resolution::Compatible {
                    warning: format!(
                        "{reference} resolved through legacy alias {alias} ({note}); update the reference"
                    ),
                    alias: alias.raw().to_string(),
                    target,
                };
            }
        }

        let suggestion = match self.nearest_paths(reference, 1).into_iter().next() {
            Some(path) => format!("Did you mean {{{path}}}?"),
            None => "Check the {token.path} syntax and that the referenced token exists in a loaded set"
                .to_string(),
        };
        Resolution::Unresolved { suggestion }
    }

    /// Follows a reference, and any references its target holds in turn,
    /// down to a concrete value.
    pub fn resolve_value(&self, reference: &Reference) -> Option<Value> {
        let mut visited = HashSet::new();
        let mut current = reference.clone();
        for _ in 0..MAX_CHAIN_DEPTH {
            let target = self.resolve(&current).target()?.clone();
            if !visited.insert(target.qualified_path()) {
                return None;
            }
            match target.leaf.value_str() {
                Some(text) if is_reference(text) => current = Reference::parse(text).ok()?,
                _ => return Some(target.leaf.value.clone()),
            }
        }
        None
    }

    /// Up to `limit` alternative references for an unresolved one, ranked:
    /// alias rewrites that exist first, then the closest paths by edit distance.
    pub fn suggest_alternatives(&self, reference: &Reference, limit: usize) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();
        for (candidate, _) in alias_candidates(reference.segments()) {
            if self.lookup(&candidate).is_some() {
                let raw = Reference::from_segments(&candidate).raw().to_string();
                if !suggestions.contains(&raw) {
                    suggestions.push(raw);
                }
            }
        }
        for path in self.nearest_paths(reference, limit) {
            let raw = format!("{{{path}}}");
            if !suggestions.contains(&raw) {
                suggestions.push(raw);
            }
        }
        suggestions.truncate(limit);
        suggestions
    }

    fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> Option<Target<'a>> {
        for set in self.sets.iter() {
            if let Some(leaf) = set.document.find_leaf(segments) {
                return Some(Target {
                    set: &set.name,
                    path: join(segments),
                    leaf,
                });
            }
        }

        let (first, rest) = segments.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let set = self.sets.get(first.as_ref())?;
        set.document.find_leaf(rest).map(|leaf| Target {
            set: &set.name,
            path: join(rest),
            leaf,
        })
    }

    fn nearest_paths(&self, reference: &Reference, limit: usize) -> Vec<String> {
        let wanted = reference.path();
        let threshold = (wanted.len() / 3).max(3);
        let mut scored: Vec<(usize, String)> = self
            .sets
            .iter()
            .flat_map(|set| set.document.leaves().into_iter().map(|(path, _)| path))
            .map(|path| (levenshtein(&wanted, &path), path))
            .filter(|(distance, _)| *distance <= threshold)
            .collect();
        scored.sort();
        scored.dedup_by(|lhs, rhs| lhs.1 == rhs.1);
        scored.into_iter().take(limit).map(|(_, path)| path).collect()
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join(".")
}

/// Legacy spellings of one segment, given the group it sits in.
fn segment_alternatives(parent: Option<&str>, segment: &str) -> Vec<(String, &'static str)> {
    let mut out = Vec::new();

    for (singular, plural) in GROUP_ALIASES {
        if segment == *singular {
            out.push(((*plural).to_string(), "plural group name"));
        } else if segment == *plural {
            out.push(((*singular).to_string(), "singular group name"));
        }
    }

    if let Some(captures) = NUMERIC_SUFFIX.captures(segment) {
        out.push((captures[1].to_string(), "numeric suffix"));
        out.push((captures[2].to_string(), "numeric suffix"));
    }

    let table = match parent.map(str::to_ascii_lowercase).as_deref() {
        Some("fontweight" | "fontweights" | "font-weight" | "font-weights") => FONT_WEIGHT_NAMES,
        Some("lineheight" | "lineheights" | "line-height" | "line-heights") => LINE_HEIGHT_NAMES,
        _ => &[],
    };
    for (number, name) in table {
        if segment == *number {
            out.push(((*name).to_string(), "numeric key"));
        } else if segment.eq_ignore_ascii_case(name) {
            out.push(((*number).to_string(), "named key"));
        }
    }

    out
}

/// Candidate paths produced by rewriting one segment, or the first and last
/// segments together, through the alias tables.
fn alias_candidates(segments: &[String]) -> Vec<(Vec<String>, &'static str)> {
    let mut out: Vec<(Vec<String>, &'static str)> = Vec::new();
    let mut push = |candidate: Vec<String>, note: &'static str| {
        if candidate != segments && !out.iter().any(|(existing, _)| *existing == candidate) {
            out.push((candidate, note));
        }
    };

    for index in 0..segments.len() {
        let parent = index.checked_sub(1).map(|i| segments[i].as_str());
        for (alternative, note) in segment_alternatives(parent, &segments[index]) {
            let mut candidate = segments.to_vec();
            candidate[index] = alternative;
            push(candidate, note);
        }
    }

    if segments.len() >= 2 {
        let last = segments.len() - 1;
        for (first, note) in segment_alternatives(None, &segments[0]) {
            let parent = if last == 1 { first.as_str() } else { segments[last - 1].as_str() };
            for (tail, _) in segment_alternatives(Some(parent), &segments[last]) {
                let mut candidate = segments.to_vec();
                candidate[0] = first.clone();
                candidate[last] = tail;
                push(candidate, note);
            }
        }
    }

    out
}

/// Classic edit distance between two strings.
pub fn levenshtein(lhs: &str, rhs: &str) -> usize {
    let rhs: Vec<char> = rhs.chars().collect();
    let mut previous: Vec<usize> = (0..=rhs.len()).collect();
    for (i, left) in lhs.chars().enumerate() {
        let mut current = vec![i + 1; rhs.len() + 1];
        for (j, right) in rhs.iter().enumerate() {
            let cost = usize::from(left != *right);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        previous = current;
    }
    previous[rhs.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aideon::tokens::model::{TokenGroup, TokenSet};
    use serde_json::json;

    fn sets(documents: &[(&str, Value)]) -> TokenSets {
        TokenSets::new(
            documents
                .iter()
                .map(|(name, value)| TokenSet {
                    name: name.to_string(),
                    file: format!("{name}.json"),
                    document: TokenGroup::from_map(value.as_object().expect("object")),
                })
                .collect(),
        )
    }

    #[test]
    fn parse_rejects_malformed_references() {
        assert!(Reference::parse("{color.primary}").is_ok());
        assert!(Reference::parse("color.primary").is_err());
        assert!(Reference::parse("{color..primary}").is_err());
        assert!(Reference::parse("{}").is_err());
    }

    #[test]
    fn embedded_references_are_found() {
        assert_eq!(
            find_references("{spacing.base} * {scale.ratio}"),
            vec!["{spacing.base}".to_string(), "{scale.ratio}".to_string()]
        );
    }

    #[test]
    fn first_set_containing_the_path_wins() {
        let loaded = sets(&[
            ("core", json!({"color": {"primary": {"$type": "color", "$value": "#111"}}})),
            ("global", json!({"color": {"primary": {"$type": "color", "$value": "#222"}}})),
        ]);
        let resolver = Resolver::new(&loaded);
        let resolution = resolver.resolve_str("{color.primary}").expect("valid reference");
        let target = resolution.target().expect("resolved");
        assert_eq!(target.set, "core");
        assert_eq!(target.leaf.value, json!("#111"));
    }

    #[test]
    fn set_qualified_paths_resolve() {
        let loaded = sets(&[("core", json!({"space": {"sm": {"$value": "4px"}}}))]);
        let resolver = Resolver::new(&loaded);
        assert!(matches!(
            resolver.resolve_str("{core.space.sm}").expect("valid"),
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn legacy_aliases_resolve_with_a_warning() {
        let loaded = sets(&[(
            "core",
            json!({"fontWeights": {"bold": {"$type": "fontWeights", "$value": "700"}}}),
        )]);
        let resolver = Resolver::new(&loaded);
        match resolver.resolve_str("{fontWeight.700}").expect("valid") {
            Resolution::Compatible { alias, .. } => assert_eq!(alias, "{fontWeights.bold}"),
            other => panic!("expected compatible resolution, got {other:?}"),
        }
    }

    #[test]
    fn chains_are_followed_to_a_value() {
        let loaded = sets(&[(
            "core",
            json!({
                "a": {"$type": "color", "$value": "#111"},
                "b": {"$type": "color", "$value": "{a}"},
                "c": {"$type": "color", "$value": "{b}"}
            }),
        )]);
        let resolver = Resolver::new(&loaded);
        let reference = Reference::parse("{c}").expect("valid");
        assert_eq!(resolver.resolve_value(&reference), Some(json!("#111")));
    }

    #[test]
    fn unresolved_references_suggest_close_paths() {
        let loaded = sets(&[("core", json!({"color": {"primary": {"$value": "#111"}}}))]);
        let resolver = Resolver::new(&loaded);
        let reference = Reference::parse("{color.primray}").expect("valid");
        match resolver.resolve(&reference) {
            Resolution::Unresolved { suggestion } => assert!(suggestion.contains("color.primary")),
            other => panic!("expected unresolved, got {other:?}"),
        }
        assert_eq!(
            resolver.suggest_alternatives(&reference, 3),
            vec!["{color.primary}".to_string()]
        );
    }

    #[test]
    fn levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
