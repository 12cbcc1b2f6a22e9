use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::instrument;

use crate::aideon::tokens::config::ThemeRules;
use crate::aideon::tokens::error::TokenError;
use crate::aideon::tokens::io::json::parse_error_suggestion;
use crate::aideon::tokens::io::modular::{THEMES_FILE, load_metadata, load_sets, load_themes};
use crate::aideon::tokens::validate::structure::check_theme_entry;
use crate::aideon::tokens::validate::{Issue, IssueKind, ValidationReport};

const VALIDATOR: &str = "themes";

/// Checks that every theme wires sets that exist, uses the required set as
/// its source and enables the recommended set, and that every loaded set is
/// used by at least one theme.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub fn validate_themes(dir: &Path, rules: &ThemeRules) -> ValidationReport {
    let mut report = ValidationReport::new(VALIDATOR, dir);

    let order = load_metadata(dir)
        .map(|metadata| metadata.token_set_order)
        .unwrap_or_default();
    let (sets, _) = load_sets(dir, &order);
    let loaded: HashSet<&str> = sets.names().into_iter().collect();

    let themes = match load_themes(dir) {
        Ok(Value::Array(themes)) => themes,
        Ok(_) => {
            report.push(
                Issue::error(IssueKind::InvalidTheme, "$themes.json must contain an array")
                    .in_file(THEMES_FILE),
            );
            return report;
        }
        Err(TokenError::MissingInput(_)) => {
            report.push(
                Issue::error(IssueKind::MissingRequiredFile, "$themes.json is missing")
                    .in_file(THEMES_FILE)
                    .with_suggestion("Run split or partial recovery to regenerate it"),
            );
            return report;
        }
        Err(TokenError::Json(err)) => {
            report.push(
                Issue::error(IssueKind::InvalidJson, format!("$themes.json is not valid JSON: {err}"))
                    .in_file(THEMES_FILE)
                    .with_suggestion(parse_error_suggestion(&err)),
            );
            return report;
        }
        Err(error) => {
            report.push(
                Issue::error(IssueKind::FileUnreadable, format!("$themes.json could not be read: {error}"))
                    .in_file(THEMES_FILE),
            );
            return report;
        }
    };

    let mut referenced: HashSet<String> = HashSet::new();

    for (index, theme) in themes.iter().enumerate() {
        for issue in check_theme_entry(index, theme) {
            report.push(issue);
        }

        let label = theme
            .get("name")
            .and_then(Value::as_str)
            .map(|name| format!("theme '{name}'"))
            .unwrap_or_else(|| format!("theme #{index}"));
        let Some(selected) = theme.get("selectedTokenSets").and_then(Value::as_object) else {
            continue;
        };

        for set in selected.keys() {
            referenced.insert(set.clone());
            if !order.contains(set) {
                report.push(
                    Issue::warning(
                        IssueKind::ThemeReferencesUnknownSet,
                        format!("{label} references set '{set}' which is not in tokenSetOrder"),
                    )
                    .in_file(THEMES_FILE)
                    .with_suggestion("Add the set to $metadata.json or remove it from the theme"),
                );
            } else if !loaded.contains(set.as_str()) {
                report.push(
                    Issue::error(
                        IssueKind::MissingTokenSet,
                        format!("{label} references set '{set}' which could not be loaded"),
                    )
                    .in_file(THEMES_FILE)
                    .with_suggestion("Restore the set file or remove the set from the theme"),
                );
            }
        }

        let required = rules.required_set.as_str();
        match selected.get(required).and_then(Value::as_str) {
            Some("source") => {}
            Some(status) => report.push(
                Issue::warning(
                    IssueKind::MissingSourceSet,
                    format!("{label} uses '{required}' as {status} instead of source"),
                )
                .in_file(THEMES_FILE)
                .with_suggestion(format!("Set \"{required}\": \"source\"")),
            ),
            None => report.push(
                Issue::warning(
                    IssueKind::MissingSourceSet,
                    format!("{label} does not reference the required set '{required}'"),
                )
                .in_file(THEMES_FILE)
                .with_suggestion(format!("Add \"{required}\": \"source\" to selectedTokenSets")),
            ),
        }

        let recommended = rules.recommended_set.as_str();
        if selected.get(recommended).and_then(Value::as_str) != Some("enabled") {
            report.push(
                Issue::warning(
                    IssueKind::RecommendedSetNotEnabled,
                    format!("{label} does not enable the recommended set '{recommended}'"),
                )
                .in_file(THEMES_FILE)
                .with_suggestion(format!("Set \"{recommended}\": \"enabled\"")),
            );
        }
    }

    for set in sets.iter() {
        if !referenced.contains(&set.name) {
            report.push(
                Issue::warning(
                    IssueKind::OrphanedTokenSet,
                    format!("token set '{}' is not used by any theme", set.name),
                )
                .in_file(set.file.clone())
                .with_suggestion("Enable the set in a theme or remove it"),
            );
        }
    }

    report
}
