use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::aideon::tokens::backup::BackupManager;
use crate::aideon::tokens::config::ThemeRules;
use crate::aideon::tokens::consolidate::{self, ConsolidateOutcome};
use crate::aideon::tokens::recovery::{RecoveryOptions, RecoveryReport, attempt_partial_recovery};
use crate::aideon::tokens::split::{self, SplitOutcome};
use crate::aideon::tokens::validate::{ValidationReport, validate_directory};

/// Snapshots `target` ahead of an operation. Returns the backup id, or the
/// warning to report when no snapshot could be taken.
fn snapshot(
    backups: &BackupManager,
    operation: &str,
    target: &Path,
    metadata: Map<String, Value>,
) -> Result<Option<String>, String> {
    if !target.exists() {
        return Ok(None);
    }
    match backups.create_backup(operation, &[PathBuf::from(target)], metadata) {
        Ok(manifest) => Ok(Some(manifest.backup_id)),
        Err(error) => {
            warn!(operation, %error, "backup failed, continuing without one");
            Err(format!("backup before {operation} failed: {error}"))
        }
    }
}

/// Splits a canonical document into a modular directory, backing up the
/// directory first when it already exists.
#[instrument(
    level = "info",
    skip_all,
    fields(source = %source.display(), out_dir = %out_dir.display())
)]
pub fn split_with_backup(source: &Path, out_dir: &Path, backups: &BackupManager) -> SplitOutcome {
    let metadata = json!({"source": source.display().to_string()});
    let snapshot = snapshot(backups, "split", out_dir, into_map(metadata));

    let mut outcome = split::split(source, out_dir);
    match snapshot {
        Ok(backup_id) => outcome.backup_id = backup_id,
        Err(warning) => outcome.warnings.push(warning),
    }
    info!(
        files = outcome.files.len(),
        success = outcome.success,
        "split finished"
    );
    outcome
}

/// Consolidates a modular directory, backing up the output document first
/// when it already exists.
#[instrument(
    level = "info",
    skip_all,
    fields(tokens_dir = %tokens_dir.display(), output = %output.display())
)]
pub fn consolidate_with_backup(
    tokens_dir: &Path,
    output: &Path,
    backups: &BackupManager,
) -> ConsolidateOutcome {
    let metadata = json!({"tokensDir": tokens_dir.display().to_string()});
    let snapshot = snapshot(backups, "consolidate", output, into_map(metadata));

    let mut outcome = consolidate::consolidate(tokens_dir, output);
    match snapshot {
        Ok(backup_id) => outcome.backup_id = backup_id,
        Err(warning) => outcome.warnings.push(warning),
    }
    info!(
        tokens_count = outcome.tokens_count,
        success = outcome.success,
        "consolidate finished"
    );
    outcome
}

/// Validates a directory and feeds the report to partial recovery.
#[instrument(level = "info", skip_all, fields(tokens_dir = %tokens_dir.display()))]
pub fn validate_and_recover(
    tokens_dir: &Path,
    options: RecoveryOptions,
    backups: &BackupManager,
    rules: &ThemeRules,
) -> (ValidationReport, RecoveryReport) {
    let report = validate_directory(tokens_dir, rules);
    info!(summary = %report.summary(), "validated before recovery");
    let recovery = attempt_partial_recovery(&report, options, backups, rules);
    (report, recovery)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
