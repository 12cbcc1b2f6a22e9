//! Canonical document → modular directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::aideon::tokens::io::json::{read_canonical, write_json};
use crate::aideon::tokens::io::modular::{METADATA_FILE, THEMES_FILE, set_file_path};
use crate::aideon::tokens::model::{
    CanonicalDocument, Metadata, ThemeDefinition, TokenDocument, TokenGroup, TokenNode,
};

/// Set receiving top-level groups the classification table does not know.
pub const FALLBACK_SET: &str = "extended";

/// Order in which classified sets are listed in `tokenSetOrder`.
pub const CANONICAL_SET_ORDER: &[&str] = &["core", "global", "simulate", "components", FALLBACK_SET];

/// Top-level group name → set. Matching ignores ASCII case.
const SET_CLASSIFICATION: &[(&str, &[&str])] = &[
    (
        "core",
        &[
            "color",
            "colors",
            "typography",
            "fontFamilies",
            "fontWeights",
            "fontSizes",
            "lineHeights",
            "letterSpacing",
            "paragraphSpacing",
            "textCase",
            "textDecoration",
            "spacing",
            "sizing",
            "dimension",
            "borderRadius",
            "borderWidth",
            "opacity",
            "boxShadow",
            "shadow",
            "shadows",
            "breakpoints",
            "zIndex",
            "duration",
            "easing",
        ],
    ),
    ("global", &["global", "semantic", "base", "alias", "theme"]),
    ("simulate", &["simulate", "brand", "brands", "marketing"]),
    (
        "components",
        &[
            "components",
            "component",
            "button",
            "input",
            "card",
            "modal",
            "navigation",
            "form",
            "badge",
            "alert",
            "table",
            "tooltip",
        ],
    ),
];

/// Looks up the set a top-level group belongs to.
pub fn classify_group(key: &str) -> Option<&'static str> {
    SET_CLASSIFICATION
        .iter()
        .find(|(_, keys)| keys.iter().any(|known| known.eq_ignore_ascii_case(key)))
        .map(|(set, _)| *set)
}

/// Result of a split.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitOutcome {
    pub success: bool,
    pub files: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
}

/// The modular representation of a document, before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub metadata: Metadata,
    pub themes: Value,
    pub sets: Vec<(String, TokenDocument)>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Decides which set each part of the document goes to and normalises every
/// token to the `$type`/`$value` shape.
pub fn plan_split(document: &CanonicalDocument) -> SplitPlan {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for key in document.tokens.attributes.keys() {
        warnings.push(format!(
            "root property '{key}' does not belong to any token set and was not written"
        ));
    }

    let carried = document.parsed_metadata();
    let sets = if splits_by_identity(document) {
        debug!("document is already modular, extracting sets directly");
        extract_sets(document, &mut errors, &mut warnings)
    } else {
        classify_sets(&document.tokens, &mut errors)
    };

    let order = build_order(&sets, carried.as_ref());
    let sets = order
        .iter()
        .filter_map(|name| {
            sets.iter()
                .find(|(set, _)| set == name)
                .map(|(set, group)| (set.clone(), group.normalized()))
        })
        .collect();

    let themes = match &document.themes {
        Some(Value::Array(items)) if !items.is_empty() => Value::Array(items.clone()),
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
        _ => {
            let theme = ThemeDefinition::default_for_sets(&order);
            serde_json::to_value(vec![theme]).unwrap_or_else(|_| Value::Array(Vec::new()))
        }
    };

    let mut metadata = carried.unwrap_or_default();
    metadata.token_set_order = order;

    SplitPlan {
        metadata,
        themes,
        sets,
        errors,
        warnings,
    }
}

fn extract_sets(
    document: &CanonicalDocument,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> Vec<(String, TokenGroup)> {
    let listed = document
        .parsed_metadata()
        .map(|metadata| metadata.token_set_order)
        .unwrap_or_default();

    let mut sets = Vec::new();
    for (name, node) in document.tokens.iter() {
        if !listed.contains(name) {
            warnings.push(format!(
                "top-level set '{name}' is not listed in tokenSetOrder and was appended"
            ));
        }
        match node {
            TokenNode::Group(group) => sets.push((name.clone(), group.clone())),
            TokenNode::Leaf(_) => errors.push(format!(
                "top-level key '{name}' is a single token, not a token set, and was skipped"
            )),
        }
    }
    sets
}

/// Whether the top-level keys of `document` are its sets.
///
/// A modular-shaped document whose groups all classify into the sets its
/// order lists is read as a consolidated document instead: consolidating
/// `{"components": {"button": ..}}` yields exactly that shape, and
/// extracting it by identity would drop a nesting level.
pub fn splits_by_identity(document: &CanonicalDocument) -> bool {
    if !document.is_modular() {
        return false;
    }
    let Some(metadata) = document.parsed_metadata() else {
        return false;
    };
    let listed = |set: &str| metadata.token_set_order.iter().any(|name| name == set);
    let consolidated = document
        .tokens
        .iter()
        .all(|(key, node)| set_for(key, node).is_some_and(listed))
        && metadata.token_set_order.iter().all(|name| {
            document
                .tokens
                .get(name)
                .is_some_and(|node| set_for(name, node) == Some(name.as_str()))
        });
    !consolidated
}

/// Set a top-level group is classified into, if any.
fn set_for(key: &str, node: &TokenNode) -> Option<&'static str> {
    classify_group(key).or_else(|| is_token_tree(node).then_some(FALLBACK_SET))
}

fn classify_sets(tokens: &TokenGroup, errors: &mut Vec<String>) -> Vec<(String, TokenGroup)> {
    let mut sets: Vec<(String, TokenGroup)> = Vec::new();

    for (key, node) in tokens.iter() {
        let set = match set_for(key, node) {
            Some(set) => {
                if classify_group(key).is_none() {
                    debug!(key = %key, set, "unrecognised top-level group");
                }
                set
            }
            None => {
                errors.push(format!(
                    "top-level key '{key}' holds no tokens and was not assigned to a set"
                ));
                continue;
            }
        };

        match sets.iter_mut().find(|(name, _)| name == set) {
            Some((_, group)) => {
                group.insert(key.clone(), node.clone());
            }
            None => {
                let mut group = TokenGroup::new();
                group.insert(key.clone(), node.clone());
                sets.push((set.to_string(), group));
            }
        }
    }

    sets
}

/// A node is a token tree when it is a token or contains at least one.
fn is_token_tree(node: &TokenNode) -> bool {
    node.leaf_count() > 0
}

/// Carried order first (restricted to sets that exist), then the remaining
/// sets in canonical order, then anything else in discovery order.
fn build_order(sets: &[(String, TokenGroup)], carried: Option<&Metadata>) -> Vec<String> {
    let exists = |name: &str| sets.iter().any(|(set, _)| set == name);
    let mut order: Vec<String> = Vec::new();

    if let Some(metadata) = carried {
        for name in &metadata.token_set_order {
            if exists(name) && !order.contains(name) {
                order.push(name.clone());
            }
        }
    }
    for name in CANONICAL_SET_ORDER {
        if exists(name) && !order.iter().any(|existing| existing == name) {
            order.push((*name).to_string());
        }
    }
    for (name, _) in sets {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    order
}

/// Writes a planned split to `out_dir`. Write failures are collected and the
/// remaining files are still written.
pub fn write_plan(plan: &SplitPlan, out_dir: &Path) -> SplitOutcome {
    let mut outcome = SplitOutcome {
        success: false,
        files: Vec::new(),
        errors: plan.errors.clone(),
        warnings: plan.warnings.clone(),
        backup_id: None,
    };

    let mut write = |path: PathBuf, value: Value| match write_json(&path, &value) {
        Ok(()) => outcome.files.push(path),
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to write modular file");
            outcome
                .errors
                .push(format!("failed to write {}: {error}", path.display()));
        }
    };

    match serde_json::to_value(&plan.metadata) {
        Ok(value) => write(out_dir.join(METADATA_FILE), value),
        Err(error) => warn!(%error, "metadata could not be serialised"),
    }
    write(out_dir.join(THEMES_FILE), plan.themes.clone());
    for (name, group) in &plan.sets {
        write(set_file_path(out_dir, name), group.to_value());
    }

    outcome.success = outcome.errors.is_empty();
    outcome
}

/// Splits an in-memory canonical document into `out_dir`.
pub fn split_document(document: &CanonicalDocument, out_dir: &Path) -> SplitOutcome {
    let plan = plan_split(document);
    info!(
        set_count = plan.sets.len(),
        sets = ?plan.metadata.token_set_order,
        "planned split"
    );
    write_plan(&plan, out_dir)
}

/// Splits the canonical document at `source` into a modular directory.
#[instrument(
    level = "info",
    skip_all,
    fields(source = %source.display(), out_dir = %out_dir.display())
)]
pub fn split(source: &Path, out_dir: &Path) -> SplitOutcome {
    match read_canonical(source) {
        Ok(document) => split_document(&document, out_dir),
        Err(error) => {
            warn!(%error, "failed to read canonical document");
            SplitOutcome {
                success: false,
                files: Vec::new(),
                errors: vec![format!("failed to read {}: {error}", source.display())],
                ..SplitOutcome::default()
            }
        }
    }
}
