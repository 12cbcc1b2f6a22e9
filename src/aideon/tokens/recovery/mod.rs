//! Partial recovery: conservative, automated fixes for the issues a
//! validation report lists.
//!
//! Missing files are recreated with minimal defaults, unparsable files are
//! repaired textually (or replaced by a skeleton), missing `$type`s are
//! inferred and patched in place. Unresolved references are never
//! rewritten; ranked alternatives are reported instead.

pub mod repair;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::aideon::tokens::backup::BackupManager;
use crate::aideon::tokens::config::ThemeRules;
use crate::aideon::tokens::error::{Result, TokenError};
use crate::aideon::tokens::io::json::{read_json, write_json};
use crate::aideon::tokens::io::modular::{METADATA_FILE, THEMES_FILE, load_directory, load_metadata};
use crate::aideon::tokens::model::{ThemeDefinition, TYPE_KEY, VALUE_KEY, infer_type};
use crate::aideon::tokens::reference::{Reference, Resolver, is_reference, value_references};
use crate::aideon::tokens::validate::{Issue, IssueKind, ValidationReport, validate_directory};

pub use repair::{RepairStep, Repaired, repair_json};

/// Operation type recorded on the snapshot taken before fixes are applied.
pub const RECOVERY_OPERATION: &str = "recovery";
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// Apply fixes; when unset only the plan is produced.
    pub auto_fix: bool,
    /// Snapshot the directory before the first change.
    pub backup_first: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            auto_fix: true,
            backup_first: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    CreateDefault,
    RepairJson,
    WriteSkeleton,
    InferType,
    SuggestReference,
}

/// One fix, applied or planned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryItem {
    pub action: RecoveryAction,
    pub issue: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub details: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub success: bool,
    pub dry_run: bool,
    pub backup_id: Option<String>,
    pub items: Vec<RecoveryItem>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Validation of the directory after the fixes were applied.
    pub revalidation: Option<ValidationReport>,
}

impl RecoveryReport {
    fn new(options: RecoveryOptions) -> Self {
        Self {
            success: true,
            dry_run: !options.auto_fix,
            backup_id: None,
            items: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            revalidation: None,
        }
    }

    pub fn applied(&self) -> usize {
        self.items.iter().filter(|item| item.applied).count()
    }

    fn record(&mut self, action: RecoveryAction, issue: &Issue, details: String, applied: bool) {
        self.items.push(RecoveryItem {
            action,
            issue: issue.kind,
            file: issue.file.clone(),
            path: issue.path.clone(),
            details,
            alternatives: Vec::new(),
            applied,
        });
    }
}

fn is_actionable(kind: IssueKind) -> bool {
    matches!(
        kind,
        IssueKind::MissingRequiredFile
            | IssueKind::MissingTokenSetFile
            | IssueKind::InvalidJson
            | IssueKind::MissingType
            | IssueKind::UnresolvedReference
            | IssueKind::LegacyReference
    )
}

/// Works through the issues of `report` against the directory it was
/// produced for.
#[instrument(
    level = "info",
    skip_all,
    fields(dir = %report.directory.display(), auto_fix = options.auto_fix)
)]
pub fn attempt_partial_recovery(
    report: &ValidationReport,
    options: RecoveryOptions,
    backups: &BackupManager,
    rules: &ThemeRules,
) -> RecoveryReport {
    let dir = report.directory.as_path();
    let mut outcome = RecoveryReport::new(options);

    let actionable: Vec<&Issue> = report
        .issues
        .iter()
        .filter(|issue| is_actionable(issue.kind))
        .collect();
    if actionable.is_empty() {
        info!("nothing to recover");
        return outcome;
    }

    if options.auto_fix && options.backup_first && dir.is_dir() {
        let mut metadata = Map::new();
        metadata.insert("issues".to_string(), json!(actionable.len()));
        match backups.create_backup(RECOVERY_OPERATION, &[dir.to_path_buf()], metadata) {
            Ok(manifest) => outcome.backup_id = Some(manifest.backup_id),
            Err(error) => {
                warn!(%error, "pre-recovery backup failed");
                outcome.warnings.push(format!("backup before recovery failed: {error}"));
            }
        }
    }

    let mut handled: HashSet<String> = HashSet::new();
    for issue in &actionable {
        let Some(file) = issue.file.as_deref() else {
            continue;
        };
        let result = match issue.kind {
            IssueKind::MissingRequiredFile | IssueKind::MissingTokenSetFile => {
                if !handled.insert(file.to_string()) {
                    continue;
                }
                create_default(dir, file, issue, options, &mut outcome)
            }
            IssueKind::InvalidJson => {
                if !handled.insert(file.to_string()) {
                    continue;
                }
                repair_file(dir, file, issue, options, &mut outcome)
            }
            _ => Ok(()),
        };
        if let Err(error) = result {
            warn!(file, %error, "recovery step failed");
            outcome.errors.push(format!("{file}: {error}"));
        }
    }

    // Type and reference fixes work on the sets as they are after the
    // file-level repairs above.
    let (sets, _) = load_directory(dir);
    let resolver = Resolver::new(&sets);
    let mut patches: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

    for issue in &actionable {
        let (Some(file), Some(path)) = (issue.file.as_deref(), issue.path.as_deref()) else {
            continue;
        };
        match issue.kind {
            IssueKind::MissingType => {
                let Some(set) = sets.iter().find(|set| set.file == file) else {
                    continue;
                };
                let Some(leaf) = set.document.find_leaf(&path.split('.').collect::<Vec<_>>()) else {
                    continue;
                };
                let token_type = type_for(&leaf.value, &resolver);
                let verb = if options.auto_fix { "set" } else { "would set" };
                outcome.record(
                    RecoveryAction::InferType,
                    issue,
                    format!("{verb} $type to \"{token_type}\""),
                    options.auto_fix,
                );
                patches
                    .entry(file.to_string())
                    .or_default()
                    .push((path.to_string(), token_type));
            }
            IssueKind::UnresolvedReference | IssueKind::LegacyReference => {
                let Some(set) = sets.iter().find(|set| set.file == file) else {
                    continue;
                };
                let Some(leaf) = set.document.find_leaf(&path.split('.').collect::<Vec<_>>()) else {
                    continue;
                };
                for raw in value_references(&leaf.value) {
                    let Ok(reference) = Reference::parse(&raw) else {
                        continue;
                    };
                    if resolver.resolve(&reference).is_resolved() {
                        continue;
                    }
                    let alternatives = resolver.suggest_alternatives(&reference, MAX_SUGGESTIONS);
                    let details = if alternatives.is_empty() {
                        format!("no close match for {raw}; fix the reference by hand")
                    } else {
                        format!("{raw} does not resolve; candidates: {}", alternatives.join(", "))
                    };
                    outcome.items.push(RecoveryItem {
                        action: RecoveryAction::SuggestReference,
                        issue: issue.kind,
                        file: issue.file.clone(),
                        path: issue.path.clone(),
                        details,
                        alternatives,
                        applied: false,
                    });
                }
            }
            _ => {}
        }
    }

    if options.auto_fix {
        for (file, fixes) in &patches {
            if let Err(error) = patch_types(&dir.join(file), fixes) {
                warn!(file = %file, %error, "failed to patch $type");
                outcome.errors.push(format!("{file}: {error}"));
            }
        }
        if outcome.applied() > 0 {
            outcome.revalidation = Some(validate_directory(dir, rules));
        }
    }

    outcome.success = outcome.errors.is_empty();
    info!(
        items = outcome.items.len(),
        applied = outcome.applied(),
        errors = outcome.errors.len(),
        "recovery finished"
    );
    outcome
}

/// Minimal content for a file of the directory.
fn skeleton(dir: &Path, file: &str) -> Value {
    match file {
        METADATA_FILE => json!({"tokenSetOrder": []}),
        THEMES_FILE => {
            let order = load_metadata(dir)
                .map(|metadata| metadata.token_set_order)
                .unwrap_or_default();
            let theme = ThemeDefinition::default_for_sets(&order);
            serde_json::to_value(vec![theme]).unwrap_or_else(|_| json!([]))
        }
        _ => json!({}),
    }
}

fn has_expected_shape(file: &str, value: &Value) -> bool {
    match file {
        THEMES_FILE => value.is_array(),
        _ => value.is_object(),
    }
}

fn create_default(
    dir: &Path,
    file: &str,
    issue: &Issue,
    options: RecoveryOptions,
    outcome: &mut RecoveryReport,
) -> Result<()> {
    let path = dir.join(file);
    if path.exists() {
        return Ok(());
    }
    if !options.auto_fix {
        outcome.record(
            RecoveryAction::CreateDefault,
            issue,
            format!("would create {file} with default content"),
            false,
        );
        return Ok(());
    }
    write_json(&path, &skeleton(dir, file))?;
    outcome.record(
        RecoveryAction::CreateDefault,
        issue,
        format!("created {file} with default content"),
        true,
    );
    Ok(())
}

fn repair_file(
    dir: &Path,
    file: &str,
    issue: &Issue,
    options: RecoveryOptions,
    outcome: &mut RecoveryReport,
) -> Result<()> {
    let path = dir.join(file);
    let text = fs::read_to_string(&path)?;

    let (action, details, value) = match repair_json(&text) {
        Some(repaired) if has_expected_shape(file, &repaired.value) => {
            let steps: Vec<&str> = repaired.steps.iter().map(RepairStep::describe).collect();
            let details = if steps.is_empty() {
                "file already parses".to_string()
            } else {
                steps.join(", ")
            };
            (RecoveryAction::RepairJson, details, repaired.value)
        }
        _ => (
            RecoveryAction::WriteSkeleton,
            "file could not be repaired; replaced with a minimal skeleton".to_string(),
            skeleton(dir, file),
        ),
    };

    if options.auto_fix {
        write_json(&path, &value)?;
    }
    outcome.record(action, issue, details, options.auto_fix);
    Ok(())
}

/// `$type` for a token. References take the type of the token they resolve
/// to, or the type inferred from its final value.
fn type_for(value: &Value, resolver: &Resolver<'_>) -> String {
    if let Some(text) = value.as_str().filter(|text| is_reference(text)) {
        if let Ok(reference) = Reference::parse(text.trim()) {
            let resolution = resolver.resolve(&reference);
            if let Some(token_type) = resolution.target().and_then(|target| target.leaf.token_type.clone()) {
                return token_type;
            }
            if let Some(resolved) = resolver.resolve_value(&reference) {
                return infer_type(&resolved).as_str().to_string();
            }
        }
    }
    infer_type(value).as_str().to_string()
}

/// Inserts `$type` in front of the other keys of each listed token.
fn patch_types(path: &Path, fixes: &[(String, String)]) -> Result<()> {
    let mut document = read_json(path)?;
    for (token_path, token_type) in fixes {
        let token = token_object(&mut document, token_path).ok_or_else(|| {
            TokenError::InvalidDocument {
                path: path.to_path_buf(),
                reason: format!("{token_path} is not a token"),
            }
        })?;
        if token.contains_key(TYPE_KEY) || !token.contains_key(VALUE_KEY) {
            continue;
        }
        let mut patched = Map::new();
        patched.insert(TYPE_KEY.to_string(), Value::String(token_type.clone()));
        patched.extend(std::mem::take(token));
        *token = patched;
    }
    write_json(path, &document)
}

fn token_object<'v>(root: &'v mut Value, token_path: &str) -> Option<&'v mut Map<String, Value>> {
    let mut current = root;
    for segment in token_path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    current.as_object_mut()
}
