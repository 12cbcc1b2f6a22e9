use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::aideon::tokens::io::modular::load_directory;
use crate::aideon::tokens::model::{TokenLeaf, TokenSet};
use crate::aideon::tokens::reference::{Reference, Resolution, Resolver, Target, value_references};
use crate::aideon::tokens::validate::{Issue, IssueKind, ValidationReport};

const VALIDATOR: &str = "references";

/// References written in formats older tooling produced. When one of these
/// fails to resolve it is a migration leftover, reported as a warning.
static MIGRATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\{(fontweights?|lineheights?|font-weights?|line-heights?)\.[a-z]*-?\d+\}$",
        r"^\{[A-Z][^}]*\}$",
        r"^\{(font-size|font-weight|line-height|letter-spacing|border-radius|font-family)s?\.[^}]+\}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("migration pattern compiles"))
    .collect()
});

/// Returns `true` when an unresolved reference matches a known legacy format.
pub fn is_migration_reference(raw: &str) -> bool {
    MIGRATION_PATTERNS.iter().any(|pattern| pattern.is_match(raw))
}

/// Resolves every reference of every loaded set and reports the ones that do
/// not resolve, resolve only through an alias, or form a two-hop cycle.
///
/// Cycle detection only looks at A → B → A (and A → A). Longer cycles are
/// not detected.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub fn validate_references(dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::new(VALIDATOR, dir);
    let (sets, failures) = load_directory(dir);
    if !failures.is_empty() {
        debug!(failed = failures.len(), "some sets could not be loaded");
    }

    let resolver = Resolver::new(&sets);
    let mut cycles: HashSet<(String, String)> = HashSet::new();
    let mut checked = 0usize;

    for set in sets.iter() {
        for (path, leaf) in set.document.leaves() {
            for raw in value_references(&leaf.value) {
                checked += 1;
                let reference = match Reference::parse(&raw) {
                    Ok(reference) => reference,
                    Err(_) => {
                        report.push(
                            Issue::error(
                                IssueKind::InvalidReference,
                                format!("{raw} in {path} is not a valid reference"),
                            )
                            .in_file(set.file.clone())
                            .at_path(path.clone())
                            .with_suggestion("Use the {token.path} syntax with non-empty segments"),
                        );
                        continue;
                    }
                };

                match resolver.resolve(&reference) {
                    Resolution::Resolved(target) => {
                        if let Some(issue) = check_cycle(set, &path, &target, &mut cycles) {
                            report.push(issue);
                        }
                    }
                    Resolution::Compatible {
                        target,
                        alias,
                        warning,
                    } => {
                        report.push(
                            Issue::warning(IssueKind::CompatibilityReference, warning)
                                .in_file(set.file.clone())
                                .at_path(path.clone())
                                .with_suggestion(format!("Replace {raw} with {alias}")),
                        );
                        if let Some(issue) = check_cycle(set, &path, &target, &mut cycles) {
                            report.push(issue);
                        }
                    }
                    Resolution::Unresolved { suggestion } => {
                        let issue = if is_migration_reference(&raw) {
                            Issue::warning(
                                IssueKind::LegacyReference,
                                format!("{raw} in {path} uses a legacy format and does not resolve"),
                            )
                        } else {
                            Issue::error(
                                IssueKind::UnresolvedReference,
                                format!("{raw} in {path} does not resolve to any token"),
                            )
                        };
                        report.push(
                            issue
                                .in_file(set.file.clone())
                                .at_path(path.clone())
                                .with_suggestion(suggestion),
                        );
                    }
                }
            }
        }
    }

    debug!(references = checked, issues = report.issues.len(), "references validated");
    report
}

/// Reports `source` when its target points straight back at it.
fn check_cycle(
    set: &TokenSet,
    path: &str,
    target: &Target<'_>,
    seen: &mut HashSet<(String, String)>,
) -> Option<Issue> {
    let source = format!("{}.{path}", set.name);
    let destination = target.qualified_path();

    let closes = if source == destination {
        true
    } else {
        points_back(target.leaf, &set.name, path)
    };
    if !closes {
        return None;
    }

    let key = if source <= destination {
        (source.clone(), destination.clone())
    } else {
        (destination.clone(), source.clone())
    };
    if !seen.insert(key) {
        return None;
    }

    Some(
        Issue::error(
            IssueKind::CircularReference,
            if source == destination {
                format!("{path} references itself")
            } else {
                format!("{path} and {} reference each other", target.path)
            },
        )
        .in_file(set.file.clone())
        .at_path(path.to_string())
        .with_suggestion("Point one of the tokens at a concrete value"),
    )
}

fn points_back(leaf: &TokenLeaf, set: &str, path: &str) -> bool {
    let qualified = format!("{set}.{path}");
    value_references(&leaf.value)
        .iter()
        .filter_map(|raw| Reference::parse(raw).ok())
        .any(|reference| {
            let candidate = reference.path();
            candidate == path || candidate == qualified
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_formats_are_recognised() {
        assert!(is_migration_reference("{fontWeights.bold-700}"));
        assert!(is_migration_reference("{lineHeights.1}"));
        assert!(is_migration_reference("{Colors.Primary}"));
        assert!(is_migration_reference("{font-size.base}"));
        assert!(!is_migration_reference("{color.primary}"));
    }
}
