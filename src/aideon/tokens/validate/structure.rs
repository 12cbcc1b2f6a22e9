use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::aideon::tokens::error::TokenError;
use crate::aideon::tokens::io::json::{parse_error_suggestion, read_json};
use crate::aideon::tokens::io::modular::{
    METADATA_FILE, THEMES_FILE, list_set_files, set_file_name,
};
use crate::aideon::tokens::model::{
    LEGACY_VALUE_KEY, TYPE_KEY, VALUE_KEY, infer_type, join_path,
};
use crate::aideon::tokens::validate::{Issue, IssueKind, ValidationReport};

const VALIDATOR: &str = "structure";
const THEME_STATUSES: &[&str] = &["enabled", "disabled", "source"];

/// Checks required files, metadata/file consistency, theme shape and the
/// shape of every token in every set file.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub fn validate_structure(dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::new(VALIDATOR, dir);

    if !dir.is_dir() {
        report.push(
            Issue::error(
                IssueKind::FileUnreadable,
                format!("token directory {} does not exist", dir.display()),
            )
            .with_suggestion("Run split to create the modular directory"),
        );
        return report;
    }

    let listed = match read_required(dir, METADATA_FILE, &mut report) {
        Some(value) => check_metadata(&value, &mut report),
        None => Vec::new(),
    };

    for set in &listed {
        let file = set_file_name(set);
        if !dir.join(&file).is_file() {
            report.push(
                Issue::error(
                    IssueKind::MissingTokenSetFile,
                    format!("token set '{set}' is listed in tokenSetOrder but {file} does not exist"),
                )
                .in_file(file)
                .with_suggestion("Create the set file or remove the set from tokenSetOrder"),
            );
        }
    }

    if let Some(value) = read_required(dir, THEMES_FILE, &mut report) {
        for issue in check_themes(&value) {
            report.push(issue);
        }
    }

    let on_disk = match list_set_files(dir, None) {
        Ok(files) => files,
        Err(error) => {
            report.push(Issue::error(
                IssueKind::FileUnreadable,
                format!("failed to list set files: {error}"),
            ));
            Vec::new()
        }
    };

    let listed_files: HashSet<String> = listed.iter().map(|set| set_file_name(set)).collect();
    for file in &on_disk {
        if !listed_files.contains(file) {
            report.push(
                Issue::warning(
                    IssueKind::OrphanedFile,
                    format!("{file} exists but its set is not listed in tokenSetOrder"),
                )
                .in_file(file.clone())
                .with_suggestion("Add the set to tokenSetOrder in $metadata.json or delete the file"),
            );
        }
        check_set_file(dir, file, &mut report);
    }

    debug!(issues = report.issues.len(), "structure validated");
    report
}

/// Re-checks a single file of the directory.
pub fn validate_file(dir: &Path, file: &str) -> ValidationReport {
    let mut report = ValidationReport::new(VALIDATOR, dir);
    match file {
        METADATA_FILE => {
            if let Some(value) = read_required(dir, METADATA_FILE, &mut report) {
                check_metadata(&value, &mut report);
            }
        }
        THEMES_FILE => {
            if let Some(value) = read_required(dir, THEMES_FILE, &mut report) {
                for issue in check_themes(&value) {
                    report.push(issue);
                }
            }
        }
        _ => check_set_file(dir, file, &mut report),
    }
    report
}

fn read_required(dir: &Path, file: &str, report: &mut ValidationReport) -> Option<Value> {
    match read_json(&dir.join(file)) {
        Ok(value) => Some(value),
        Err(TokenError::MissingInput(_)) => {
            report.push(
                Issue::error(IssueKind::MissingRequiredFile, format!("{file} is missing"))
                    .in_file(file)
                    .with_suggestion("Run split or partial recovery to regenerate it"),
            );
            None
        }
        Err(error) => {
            report.push(read_failure(file, error));
            None
        }
    }
}

fn read_failure(file: &str, error: TokenError) -> Issue {
    match error {
        TokenError::Json(err) => Issue::error(
            IssueKind::InvalidJson,
            format!("{file} is not valid JSON: {err}"),
        )
        .in_file(file)
        .with_suggestion(parse_error_suggestion(&err)),
        other => Issue::error(
            IssueKind::FileUnreadable,
            format!("{file} could not be read: {other}"),
        )
        .in_file(file)
        .with_suggestion("Check that the file exists and is readable"),
    }
}

/// Validates `$metadata.json` and returns the set names it lists.
fn check_metadata(value: &Value, report: &mut ValidationReport) -> Vec<String> {
    let Some(order) = value.get("tokenSetOrder") else {
        report.push(
            Issue::error(IssueKind::InvalidMetadata, "tokenSetOrder is missing")
                .in_file(METADATA_FILE)
                .with_suggestion("Add \"tokenSetOrder\": [] listing the token sets in merge order"),
        );
        return Vec::new();
    };
    let Some(entries) = order.as_array() else {
        report.push(
            Issue::error(IssueKind::InvalidMetadata, "tokenSetOrder must be an array")
                .in_file(METADATA_FILE)
                .with_suggestion("Make tokenSetOrder an array of set names"),
        );
        return Vec::new();
    };

    let mut sets = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry.as_str() {
            Some(set) if sets.iter().any(|seen| seen == set) => report.push(
                Issue::warning(
                    IssueKind::InvalidMetadata,
                    format!("token set '{set}' is listed more than once"),
                )
                .in_file(METADATA_FILE)
                .with_suggestion("Remove the duplicate entry"),
            ),
            Some(set) => sets.push(set.to_string()),
            None => report.push(
                Issue::error(
                    IssueKind::InvalidMetadata,
                    format!("tokenSetOrder[{index}] is not a string"),
                )
                .in_file(METADATA_FILE)
                .with_suggestion("Every tokenSetOrder entry must be a set name"),
            ),
        }
    }
    sets
}

/// Validates the shape of `$themes.json`.
pub fn check_themes(value: &Value) -> Vec<Issue> {
    match value.as_array() {
        Some(themes) => themes
            .iter()
            .enumerate()
            .flat_map(|(index, theme)| check_theme_entry(index, theme))
            .collect(),
        None => vec![
            Issue::error(IssueKind::InvalidTheme, "$themes.json must contain an array")
                .in_file(THEMES_FILE)
                .with_suggestion("Wrap the theme definitions in a JSON array"),
        ],
    }
}

/// Checks that a theme has `id`, `name` and a well-formed `selectedTokenSets`.
pub fn check_theme_entry(index: usize, theme: &Value) -> Vec<Issue> {
    let mut issues = Vec::new();
    let Some(map) = theme.as_object() else {
        issues.push(
            Issue::error(IssueKind::InvalidTheme, format!("theme #{index} is not an object"))
                .in_file(THEMES_FILE),
        );
        return issues;
    };

    let label = map
        .get("name")
        .and_then(Value::as_str)
        .map(|name| format!("theme '{name}'"))
        .unwrap_or_else(|| format!("theme #{index}"));

    for property in ["id", "name"] {
        if !map.get(property).is_some_and(Value::is_string) {
            issues.push(
                Issue::error(
                    IssueKind::InvalidTheme,
                    format!("{label} has no string '{property}'"),
                )
                .in_file(THEMES_FILE)
                .with_suggestion(format!("Add a \"{property}\" string to the theme")),
            );
        }
    }

    match map.get("selectedTokenSets") {
        Some(Value::Object(selected)) => {
            for (set, status) in selected {
                let known = status
                    .as_str()
                    .is_some_and(|status| THEME_STATUSES.contains(&status));
                if !known {
                    issues.push(
                        Issue::warning(
                            IssueKind::InvalidTheme,
                            format!("{label} gives set '{set}' the unknown status {status}"),
                        )
                        .in_file(THEMES_FILE)
                        .with_suggestion("Use one of \"enabled\", \"disabled\" or \"source\""),
                    );
                }
            }
        }
        _ => issues.push(
            Issue::error(
                IssueKind::InvalidTheme,
                format!("{label} has no selectedTokenSets object"),
            )
            .in_file(THEMES_FILE)
            .with_suggestion("Add \"selectedTokenSets\": {\"core\": \"source\"}"),
        ),
    }

    issues
}

fn check_set_file(dir: &Path, file: &str, report: &mut ValidationReport) {
    match read_json(&dir.join(file)) {
        Ok(Value::Object(map)) => {
            for issue in check_set_document(file, &map) {
                report.push(issue);
            }
        }
        Ok(_) => report.push(
            Issue::error(
                IssueKind::InvalidJson,
                format!("{file} must contain a JSON object"),
            )
            .in_file(file)
            .with_suggestion("Wrap the tokens in a top-level object"),
        ),
        Err(error) => report.push(read_failure(file, error)),
    }
}

/// Checks every token of a set document.
pub fn check_set_document(file: &str, document: &Map<String, Value>) -> Vec<Issue> {
    let mut issues = Vec::new();
    walk_group(file, "", document, &mut issues);
    issues
}

fn walk_group(file: &str, prefix: &str, group: &Map<String, Value>, issues: &mut Vec<Issue>) {
    let mut children = 0;
    for (key, value) in group {
        if key.starts_with('$') {
            continue;
        }
        children += 1;
        let path = join_path(prefix, key);
        match value {
            Value::Object(map) if map.contains_key(VALUE_KEY) => {
                if !map.contains_key(TYPE_KEY) {
                    let inferred = infer_type(&map[VALUE_KEY]);
                    issues.push(
                        Issue::warning(IssueKind::MissingType, format!("token {path} has no $type"))
                            .in_file(file)
                            .at_path(path)
                            .with_suggestion(format!("Add \"$type\": \"{inferred}\"")),
                    );
                }
            }
            Value::Object(map) if map.contains_key(LEGACY_VALUE_KEY) => issues.push(
                Issue::error(
                    IssueKind::MissingValue,
                    format!("token {path} uses legacy 'value' instead of '$value'"),
                )
                .in_file(file)
                .at_path(path)
                .with_suggestion("Rename \"value\"/\"type\" to \"$value\"/\"$type\", or run split to normalise"),
            ),
            Value::Object(map) => walk_group(file, &path, map, issues),
            _ => issues.push(
                Issue::error(
                    IssueKind::MissingValue,
                    format!("{path} is a bare literal without $value"),
                )
                .in_file(file)
                .at_path(path)
                .with_suggestion("Wrap the literal as {\"$type\": ..., \"$value\": ...}"),
            ),
        }
    }

    if children == 0 && !prefix.is_empty() {
        issues.push(
            Issue::info(IssueKind::EmptyGroup, format!("group {prefix} contains no tokens"))
                .in_file(file)
                .at_path(prefix),
        );
    }
}
