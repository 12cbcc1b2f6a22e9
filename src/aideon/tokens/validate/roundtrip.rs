use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, instrument, warn};

use crate::aideon::tokens::consolidate::{consolidate, consolidate_directory, merge_sets};
use crate::aideon::tokens::diff::{Difference, diff_values};
use crate::aideon::tokens::io::json::{canonical_string, read_canonical};
use crate::aideon::tokens::model::{CanonicalDocument, TokenDocument, TokenSet, TokenSets};
use crate::aideon::tokens::reference::value_references;
use crate::aideon::tokens::split::{split_document, splits_by_identity};
use crate::aideon::tokens::validate::{Issue, IssueKind, ValidationReport};

const VALIDATOR: &str = "roundtrip";

/// Splits a canonical document and consolidates it back inside a private
/// scratch directory, then reports every value, description or reference
/// that did not survive.
///
/// With `original` unset, the directory's own consolidated form is used as
/// the original. A roundtrip that cannot run is reported as skipped.
#[instrument(level = "info", skip_all, fields(dir = %tokens_dir.display()))]
pub fn validate_roundtrip(tokens_dir: &Path, original: Option<&Path>) -> ValidationReport {
    let mut report = ValidationReport::new(VALIDATOR, tokens_dir);

    let scratch = match scratch_dir(tokens_dir) {
        Ok(scratch) => scratch,
        Err(error) => {
            report.push(skipped(format!("could not create a scratch directory: {error}")));
            return report;
        }
    };

    let original = match original {
        Some(path) => match read_canonical(path) {
            Ok(document) => document,
            Err(error) => {
                report.push(skipped(format!("could not read {}: {error}", path.display())));
                return report;
            }
        },
        None => {
            let (document, outcome) = consolidate_directory(tokens_dir);
            if !outcome.success {
                report.push(skipped(format!(
                    "the directory could not be consolidated: {}",
                    outcome.errors.join("; ")
                )));
                return report;
            }
            document
        }
    };

    let split_dir = scratch.path().join("split");
    let split = split_document(&original, &split_dir);
    if !split.success {
        report.push(skipped(format!("split failed: {}", split.errors.join("; "))));
        return report;
    }

    let consolidated_path = scratch.path().join("consolidated.json");
    let consolidated = consolidate(&split_dir, &consolidated_path);
    if !consolidated.success {
        report.push(skipped(format!(
            "consolidate failed: {}",
            consolidated.errors.join("; ")
        )));
        return report;
    }

    let reconstituted = match read_canonical(&consolidated_path) {
        Ok(document) => document,
        Err(error) => {
            report.push(skipped(format!("could not read the consolidated document: {error}")));
            return report;
        }
    };

    compare(&original, &reconstituted, &mut report);
    debug!(issues = report.issues.len(), "roundtrip compared");

    if let Err(error) = scratch.close() {
        warn!(%error, "failed to remove roundtrip scratch directory");
    }
    report
}

/// Scratch space inside the token directory when possible, so it stays on
/// the same filesystem; hidden so the set-file listing ignores it.
fn scratch_dir(tokens_dir: &Path) -> std::io::Result<TempDir> {
    if tokens_dir.is_dir() {
        if let Ok(dir) = tempfile::Builder::new()
            .prefix(".roundtrip-")
            .tempdir_in(tokens_dir)
        {
            return Ok(dir);
        }
    }
    tempfile::Builder::new().prefix("aideon-roundtrip-").tempdir()
}

fn skipped(message: String) -> Issue {
    Issue::warning(IssueKind::RoundtripSkipped, format!("roundtrip skipped: {message}"))
        .with_suggestion("Fix the errors reported by the structure validator and run again")
}

/// The token tree consolidation is expected to reproduce. Documents already
/// in modular shape consolidate to the ordered merge of their sets.
fn expected_tokens(original: &CanonicalDocument) -> TokenDocument {
    if !splits_by_identity(original) {
        return original.tokens.clone();
    }
    let order = original
        .parsed_metadata()
        .map(|metadata| metadata.token_set_order)
        .unwrap_or_default();
    let sets = order
        .iter()
        .filter_map(|name| {
            original
                .tokens
                .get(name)
                .and_then(|node| node.as_group())
                .map(|group| TokenSet {
                    name: name.clone(),
                    file: String::new(),
                    document: group.clone(),
                })
        })
        .collect();
    merge_sets(&TokenSets::new(sets))
}

fn compare(original: &CanonicalDocument, reconstituted: &CanonicalDocument, report: &mut ValidationReport) {
    let expected = expected_tokens(original);
    let actual = &reconstituted.tokens;

    for (path, leaf) in expected.leaves() {
        if leaf.token_type.is_none() {
            let inferred = actual
                .find_leaf(&segments(&path))
                .and_then(|leaf| leaf.token_type.clone())
                .unwrap_or_default();
            report.push(
                Issue::info(
                    IssueKind::TypeInferred,
                    format!("{path} had no type; split inferred '{inferred}'"),
                )
                .at_path(path.clone()),
            );
        }
    }

    for difference in diff_values(&expected.normalized().to_value(), &actual.to_value()) {
        report.push(difference_issue(&difference));
    }

    if let Some(themes) = original.themes.as_ref().filter(|themes| carries(themes)) {
        let survived = reconstituted
            .themes
            .as_ref()
            .is_some_and(|after| canonical_string(after) == canonical_string(themes));
        if !survived {
            report.push(
                Issue::error(IssueKind::ValueMismatch, "theme definitions changed during the roundtrip")
                    .at_path("$themes")
                    .with_suggestion("Check that $themes.json is copied verbatim by split"),
            );
        }
    }

    for (path, leaf) in expected.leaves() {
        let after = actual.find_leaf(&segments(&path));

        if let Some(description) = &leaf.description {
            if after.and_then(|leaf| leaf.description.as_ref()) != Some(description) {
                report.push(
                    Issue::error(
                        IssueKind::DescriptionLost,
                        format!("the description of {path} was lost or changed"),
                    )
                    .at_path(path.clone())
                    .with_suggestion("Descriptions must be carried as $description"),
                );
            }
        }

        for raw in value_references(&leaf.value) {
            let kept = after.is_some_and(|leaf| value_references(&leaf.value).contains(&raw));
            if !kept {
                report.push(
                    Issue::error(
                        IssueKind::ReferenceLost,
                        format!("reference {raw} in {path} did not survive the roundtrip"),
                    )
                    .at_path(path.clone())
                    .with_suggestion("References must be written back unresolved"),
                );
            }
        }
    }
}

fn difference_issue(difference: &Difference) -> Issue {
    match difference {
        Difference::MissingKey { path, expected } => Issue::error(
            IssueKind::MissingKey,
            format!("{path} is missing after the roundtrip (was {expected})"),
        )
        .at_path(path.clone())
        .with_suggestion("Check that the top-level group is classified into a set"),
        Difference::ExtraKey { path, actual } => Issue::warning(
            IssueKind::ExtraKey,
            format!("{path} appeared during the roundtrip (now {actual})"),
        )
        .at_path(path.clone())
        .with_suggestion("A later set may be overriding or adding tokens"),
        Difference::ValueMismatch {
            path,
            expected,
            actual,
        } => Issue::error(
            IssueKind::ValueMismatch,
            format!("{path} changed from {expected} to {actual}"),
        )
        .at_path(path.clone())
        .with_suggestion("A later set in tokenSetOrder may be overriding this token"),
    }
}

fn carries(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}
