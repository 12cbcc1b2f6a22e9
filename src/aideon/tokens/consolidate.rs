//! Modular directory → canonical document.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::aideon::tokens::error::TokenError;
use crate::aideon::tokens::io::json::write_json;
use crate::aideon::tokens::io::modular::{load_metadata, load_sets, load_themes};
use crate::aideon::tokens::model::{CanonicalDocument, TokenGroup, TokenNode, TokenSets};

/// Result of a consolidation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateOutcome {
    pub success: bool,
    pub tokens_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
}

/// Deep-merges `source` into `target`. Groups present on both sides merge
/// recursively; anything else from `source` replaces what `target` holds.
pub fn merge_into(target: &mut TokenGroup, source: &TokenGroup) {
    for (key, value) in &source.attributes {
        target.attributes.insert(key.clone(), value.clone());
    }
    for (key, node) in source.iter() {
        let merged = match (target.get_mut(key), node) {
            (Some(TokenNode::Group(existing)), TokenNode::Group(incoming)) => {
                merge_into(existing, incoming);
                true
            }
            _ => false,
        };
        if !merged {
            target.insert(key.clone(), node.clone());
        }
    }
}

/// Merges loaded sets in order; later sets win on collisions.
pub fn merge_sets(sets: &TokenSets) -> TokenGroup {
    let mut merged = TokenGroup::new();
    for set in sets.iter() {
        merge_into(&mut merged, &set.document);
    }
    merged
}

/// Builds the canonical document for a modular directory without writing it.
pub fn consolidate_directory(dir: &Path) -> (CanonicalDocument, ConsolidateOutcome) {
    let mut outcome = ConsolidateOutcome::default();

    let metadata = match load_metadata(dir) {
        Ok(metadata) => metadata,
        Err(error) => {
            outcome.errors.push(format!("failed to read metadata: {error}"));
            return (CanonicalDocument::default(), outcome);
        }
    };

    let (sets, failures) = load_sets(dir, &metadata.token_set_order);
    for failure in failures {
        match failure.error {
            TokenError::MissingInput(_) => outcome.warnings.push(format!(
                "token set '{}' has no file {}; continuing without it",
                failure.set, failure.file
            )),
            error => outcome
                .errors
                .push(format!("failed to read token set '{}': {error}", failure.set)),
        }
    }

    let tokens = merge_sets(&sets);

    let themes = match load_themes(dir) {
        Ok(themes) if carries_information(&themes) => Some(themes),
        Ok(_) => None,
        Err(TokenError::MissingInput(_)) => None,
        Err(error) => {
            outcome.warnings.push(format!("themes were not carried over: {error}"));
            None
        }
    };
    let metadata = if metadata.is_informative() {
        serde_json::to_value(&metadata).ok()
    } else {
        None
    };

    outcome.tokens_count = tokens.leaf_count();
    outcome.success = outcome.errors.is_empty();
    (
        CanonicalDocument {
            tokens,
            metadata,
            themes,
        },
        outcome,
    )
}

fn carries_information(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Consolidates the modular directory `tokens_dir` into the canonical
/// document at `output`.
#[instrument(
    level = "info",
    skip_all,
    fields(tokens_dir = %tokens_dir.display(), output = %output.display())
)]
pub fn consolidate(tokens_dir: &Path, output: &Path) -> ConsolidateOutcome {
    let (document, mut outcome) = consolidate_directory(tokens_dir);
    if outcome.tokens_count == 0 && !outcome.errors.is_empty() {
        warn!(errors = ?outcome.errors, "nothing to consolidate");
        return outcome;
    }

    if let Err(error) = write_json(output, &document.to_value()) {
        warn!(%error, "failed to write canonical document");
        outcome
            .errors
            .push(format!("failed to write {}: {error}", output.display()));
        outcome.success = false;
        return outcome;
    }

    info!(tokens_count = outcome.tokens_count, "consolidated token sets");
    outcome
}
