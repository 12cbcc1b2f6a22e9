use std::fs;
use std::path::{Path, PathBuf};

use aideon_tokens::TokenError;
use aideon_tokens::backup::{BackupManager, NoChangeProbe, RollbackOptions, WorkingTreeProbe};
use aideon_tokens::sync::split_with_backup;
use serde_json::{Map, Value, json};
use tempfile::tempdir;

struct DirtyProbe;

impl WorkingTreeProbe for DirtyProbe {
    fn uncommitted_changes(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths.to_vec()
    }
}

fn manager(workspace: &Path, retention: usize) -> BackupManager {
    BackupManager::new(workspace.join(".token-backups"), retention).with_probe(NoChangeProbe)
}

fn token_dir(workspace: &Path) -> PathBuf {
    let dir = workspace.join("tokens");
    fs::create_dir_all(dir.join("brand")).expect("token directory created");
    fs::write(dir.join("$metadata.json"), "{\"tokenSetOrder\": [\"core\"]}\n").expect("metadata");
    fs::write(dir.join("core.json"), "{\"a\": {\"$value\": \"#111\"}}\n").expect("core");
    fs::write(dir.join("brand").join("light.json"), "{}\n").expect("nested set");
    dir
}

#[test]
fn rollback_restores_files_byte_for_byte() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let original_core = fs::read(tokens.join("core.json")).expect("core readable");
    let original_nested = fs::read(tokens.join("brand/light.json")).expect("nested readable");

    let backups = manager(workspace.path(), 10);
    let manifest = backups
        .create_backup("split", &[tokens.clone()], Map::new())
        .expect("backup created");
    assert_eq!(manifest.backed_up_files.len(), 3);
    assert!(manifest.backup_id.starts_with("split-"));

    fs::write(tokens.join("core.json"), "{\"a\": {\"$value\": \"#999\"}}").expect("core edited");
    fs::remove_file(tokens.join("brand/light.json")).expect("nested removed");

    let report = backups
        .rollback(&manifest.backup_id, RollbackOptions::default())
        .expect("rollback succeeds");
    assert!(report.success());
    assert_eq!(report.files.len(), 3);

    assert_eq!(fs::read(tokens.join("core.json")).expect("core readable"), original_core);
    assert_eq!(
        fs::read(tokens.join("brand/light.json")).expect("nested readable"),
        original_nested
    );

    let snapshot = report.pre_rollback_backup.expect("pre-rollback snapshot taken");
    let pre = backups.get_backup(&snapshot).expect("snapshot listed");
    assert_eq!(pre.operation_type, "pre-rollback");
    assert_eq!(pre.metadata.get("rollbackOf"), Some(&json!(manifest.backup_id)));
}

#[test]
fn dry_run_lists_files_without_writing() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let backups = manager(workspace.path(), 10);
    let manifest = backups
        .create_backup("consolidate", &[tokens.join("core.json")], Map::new())
        .expect("backup created");

    fs::write(tokens.join("core.json"), "{}").expect("core edited");
    let report = backups
        .rollback(
            &manifest.backup_id,
            RollbackOptions {
                dry_run: true,
                force: false,
            },
        )
        .expect("dry run succeeds");

    assert!(report.dry_run);
    assert_eq!(report.files, vec![std::path::absolute(tokens.join("core.json")).expect("absolute")]);
    assert!(report.pre_rollback_backup.is_none());
    assert_eq!(fs::read_to_string(tokens.join("core.json")).expect("core readable"), "{}");
}

#[test]
fn uncommitted_changes_block_rollback_unless_forced() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let backups = BackupManager::new(workspace.path().join(".token-backups"), 10).with_probe(DirtyProbe);
    let manifest = backups
        .create_backup("split", &[tokens.clone()], Map::new())
        .expect("backup created");

    let refused = backups.rollback(&manifest.backup_id, RollbackOptions::default());
    assert!(matches!(refused, Err(TokenError::RollbackRefused { .. })));

    let forced = backups
        .rollback(
            &manifest.backup_id,
            RollbackOptions {
                dry_run: false,
                force: true,
            },
        )
        .expect("forced rollback succeeds");
    assert_eq!(forced.files.len(), 3);
}

#[test]
fn empty_backups_cannot_be_restored() {
    let workspace = tempdir().expect("temporary directory");
    let backups = manager(workspace.path(), 10);
    let manifest = backups
        .create_backup("split", &[workspace.path().join("missing")], Map::new())
        .expect("backup of nothing is recorded");
    assert!(manifest.backed_up_files.is_empty());

    let result = backups.rollback(&manifest.backup_id, RollbackOptions::default());
    assert!(matches!(result, Err(TokenError::NothingToRestore(_))));

    let unknown = backups.rollback("split-unknown", RollbackOptions::default());
    assert!(matches!(unknown, Err(TokenError::BackupNotFound(_))));
}

#[test]
fn retention_prunes_the_oldest_backups_per_operation() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let backups = manager(workspace.path(), 2);

    for _ in 0..3 {
        backups
            .create_backup("split", &[tokens.join("core.json")], Map::new())
            .expect("backup created");
    }
    backups
        .create_backup("consolidate", &[tokens.join("core.json")], Map::new())
        .expect("backup created");

    assert_eq!(backups.list_backups(Some("split")).expect("listed").len(), 2);
    assert_eq!(backups.list_backups(None).expect("listed").len(), 3);
}

#[test]
fn manifests_use_camel_case_fields() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let backups = manager(workspace.path(), 10);
    let manifest = backups
        .create_backup("split", &[tokens.join("core.json")], Map::new())
        .expect("backup created");

    let path = backups.root().join(&manifest.backup_id).join("manifest.json");
    let stored: Value =
        serde_json::from_str(&fs::read_to_string(path).expect("manifest readable")).expect("JSON");
    for field in ["backupId", "operationType", "timestamp", "sourcePaths", "backedUpFiles", "metadata"] {
        assert!(stored.get(field).is_some(), "manifest lacks {field}");
    }

    backups.delete_backup(&manifest.backup_id).expect("backup deleted");
    assert!(backups.list_backups(None).expect("listed").is_empty());
}

#[test]
fn split_backs_up_an_existing_directory_first() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = token_dir(workspace.path());
    let source = workspace.path().join("tokens.json");
    fs::write(
        &source,
        "{\"color\": {\"primary\": {\"$type\": \"color\", \"$value\": \"#ff0000\"}}}",
    )
    .expect("source written");

    let backups = manager(workspace.path(), 10);
    let outcome = split_with_backup(&source, &tokens, &backups);
    assert!(outcome.success, "split failed: {:?}", outcome.errors);

    let backup_id = outcome.backup_id.expect("existing directory was backed up");
    let manifest = backups.get_backup(&backup_id).expect("backup listed");
    assert_eq!(manifest.operation_type, "split");
    let stored_core = manifest
        .backed_up_files
        .iter()
        .find(|file| file.source.ends_with("core.json"))
        .expect("core.json captured");
    let copy = backups.root().join(&backup_id).join(&stored_core.stored);
    assert_eq!(
        fs::read_to_string(copy).expect("copy readable"),
        "{\"a\": {\"$value\": \"#111\"}}\n"
    );
}

#[test]
fn undoing_a_rollback_keeps_the_backup_it_restores() {
    let workspace = tempdir().expect("temporary directory");
    let core = workspace.path().join("core.json");
    fs::write(&core, "v1").expect("v1 written");
    let backups = manager(workspace.path(), 1);

    let first = backups
        .create_backup("split", std::slice::from_ref(&core), Map::new())
        .expect("backup created");
    fs::write(&core, "v2").expect("v2 written");

    let rollback = backups
        .rollback(&first.backup_id, RollbackOptions::default())
        .expect("rollback succeeds");
    assert_eq!(fs::read_to_string(&core).expect("core readable"), "v1");
    let undo_id = rollback.pre_rollback_backup.expect("current state snapshotted");

    let undo = backups
        .rollback(&undo_id, RollbackOptions::default())
        .expect("undo succeeds");
    assert!(undo.success(), "{:?}", undo.errors);
    assert_eq!(fs::read_to_string(&core).expect("core readable"), "v2");
    assert!(backups.get_backup(&undo_id).is_ok());

    let snapshot = undo.pre_rollback_backup.expect("undo snapshotted");
    assert!(backups.get_backup(&snapshot).is_ok());
}

#[test]
fn backup_names_cannot_escape_the_root() {
    let workspace = tempdir().expect("temporary directory");
    let outside = workspace.path().join("x");
    fs::create_dir_all(&outside).expect("sibling directory created");
    fs::write(outside.join("manifest.json"), "{}").expect("decoy manifest written");
    let backups = manager(workspace.path(), 10);

    for name in ["../x", "..", "a/b", ""] {
        assert!(
            matches!(backups.delete_backup(name), Err(TokenError::InvalidBackupName(_))),
            "{name:?} accepted"
        );
        assert!(matches!(
            backups.rollback(name, RollbackOptions::default()),
            Err(TokenError::InvalidBackupName(_))
        ));
    }
    assert!(outside.join("manifest.json").is_file());

    let created = backups.create_backup("../split", &[outside.clone()], Map::new());
    assert!(matches!(created, Err(TokenError::InvalidBackupName(_))));
}
