//! Snapshots of files and directories taken before mutating operations, and
//! rollback from those snapshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::aideon::tokens::config::BackupConfig;
use crate::aideon::tokens::error::{Result, TokenError};

/// Manifest file stored at the top of every backup folder.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Folder inside a backup holding the copied content.
const CONTENT_DIR: &str = "files";
/// Operation type of the snapshot taken before a rollback.
pub const PRE_ROLLBACK: &str = "pre-rollback";

/// Description of one backup, persisted as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub backup_id: String,
    pub operation_type: String,
    pub timestamp: DateTime<Utc>,
    pub source_paths: Vec<PathBuf>,
    pub backed_up_files: Vec<BackedUpFile>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A file copied into a backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackedUpFile {
    /// Absolute path the file was copied from.
    pub source: PathBuf,
    /// Location of the copy, relative to the backup folder.
    pub stored: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub backup_id: String,
    pub dry_run: bool,
    /// Files restored, or that would be restored on a dry run.
    pub files: Vec<PathBuf>,
    pub pre_rollback_backup: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RollbackReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Best-effort check for changes made to the working tree outside of this tool.
pub trait WorkingTreeProbe {
    /// Paths under `paths` with uncommitted modifications.
    fn uncommitted_changes(&self, paths: &[PathBuf]) -> Vec<PathBuf>;
}

/// Asks `git status` about tracked files. Untracked files are ignored and
/// any failure to run git counts as a clean tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitStatusProbe;

impl WorkingTreeProbe for GitStatusProbe {
    fn uncommitted_changes(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let Some(first) = paths.first() else {
            return Vec::new();
        };
        let workdir = if first.is_dir() {
            first.as_path()
        } else {
            first.parent().unwrap_or(first.as_path())
        };

        let output = Command::new("git")
            .arg("-C")
            .arg(workdir)
            .args(["status", "--porcelain", "--"])
            .args(paths)
            .output();

        match output {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter(|line| line.len() > 3 && !line.starts_with("??"))
                .map(|line| PathBuf::from(line[3..].trim()))
                .collect(),
            Ok(output) => {
                debug!(status = %output.status, "git status unavailable, assuming a clean tree");
                Vec::new()
            }
            Err(error) => {
                debug!(%error, "git not runnable, assuming a clean tree");
                Vec::new()
            }
        }
    }
}

/// Probe that never reports changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChangeProbe;

impl WorkingTreeProbe for NoChangeProbe {
    fn uncommitted_changes(&self, _paths: &[PathBuf]) -> Vec<PathBuf> {
        Vec::new()
    }
}

pub struct BackupManager {
    root: PathBuf,
    retention: usize,
    probe: Box<dyn WorkingTreeProbe>,
}

impl BackupManager {
    /// Creates a manager storing backups under `root` and keeping
    /// `retention` backups per operation type (0 keeps everything).
    pub fn new(root: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            root: root.into(),
            retention,
            probe: Box::new(GitStatusProbe),
        }
    }

    pub fn from_config(config: &BackupConfig, base: &Path) -> Self {
        let manager = Self::new(config.resolve_root(base), config.retention);
        if config.check_uncommitted {
            manager
        } else {
            manager.with_probe(NoChangeProbe)
        }
    }

    pub fn with_probe(mut self, probe: impl WorkingTreeProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `paths` into a new backup folder and records a manifest.
    /// Paths that do not exist are skipped with a warning; the backup root
    /// itself is never copied.
    #[instrument(level = "info", skip(self, paths, metadata), fields(root = %self.root.display()))]
    pub fn create_backup(
        &self,
        operation_type: &str,
        paths: &[PathBuf],
        metadata: Map<String, Value>,
    ) -> Result<BackupManifest> {
        self.create_backup_keeping(operation_type, paths, metadata, &[])
    }

    /// Creates a backup, then prunes its operation type without touching
    /// the new backup or any id in `keep`.
    fn create_backup_keeping(
        &self,
        operation_type: &str,
        paths: &[PathBuf],
        metadata: Map<String, Value>,
        keep: &[&str],
    ) -> Result<BackupManifest> {
        check_name(operation_type)?;
        let timestamp = Utc::now();
        let random = Uuid::new_v4().simple().to_string();
        let backup_id = format!(
            "{operation_type}-{}-{}",
            timestamp.format("%Y%m%dT%H%M%S%3fZ"),
            &random[..8]
        );
        let folder = self.root.join(&backup_id);
        fs::create_dir_all(folder.join(CONTENT_DIR))?;

        let root = std::path::absolute(&self.root)?;
        let mut manifest = BackupManifest {
            backup_id,
            operation_type: operation_type.to_string(),
            timestamp,
            source_paths: Vec::new(),
            backed_up_files: Vec::new(),
            metadata,
        };

        for (index, path) in paths.iter().enumerate() {
            let source = std::path::absolute(path)?;
            if !source.exists() {
                warn!(path = %source.display(), "backup source does not exist, skipping");
                continue;
            }
            if source.starts_with(&root) {
                warn!(path = %source.display(), "refusing to back up the backup root");
                continue;
            }

            let slot = PathBuf::from(CONTENT_DIR).join(index.to_string());
            if source.is_file() {
                let name = source.file_name().map(PathBuf::from).unwrap_or_default();
                let stored = slot.join(name);
                manifest
                    .backed_up_files
                    .push(copy_into(&source, &folder, stored)?);
            } else {
                let walker = WalkDir::new(&source)
                    .follow_links(false)
                    .into_iter()
                    .filter_entry(|entry| !entry.path().starts_with(&root));
                for entry in walker {
                    let entry = entry?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
                    let stored = slot.join(relative);
                    manifest
                        .backed_up_files
                        .push(copy_into(entry.path(), &folder, stored)?);
                }
            }
            manifest.source_paths.push(source);
        }

        let manifest_text = serde_json::to_string_pretty(&manifest)?;
        fs::write(folder.join(MANIFEST_FILE), manifest_text)?;
        info!(
            backup_id = %manifest.backup_id,
            files = manifest.backed_up_files.len(),
            "backup created"
        );

        let mut kept = keep.to_vec();
        kept.push(manifest.backup_id.as_str());
        let pruned = self.prune_keeping(operation_type, &kept)?;
        if !pruned.is_empty() {
            debug!(?pruned, "pruned old backups");
        }
        Ok(manifest)
    }

    /// Manifests under the root, newest first, optionally restricted to one
    /// operation type. Folders without a readable manifest are skipped.
    pub fn list_backups(&self, operation_type: Option<&str>) -> Result<Vec<BackupManifest>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let manifest_path = entry.path().join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            match read_manifest(&manifest_path) {
                Ok(manifest) => {
                    if operation_type.is_none_or(|kind| manifest.operation_type == kind) {
                        manifests.push(manifest);
                    }
                }
                Err(error) => {
                    warn!(path = %manifest_path.display(), %error, "skipping unreadable manifest");
                }
            }
        }

        manifests.sort_by(|lhs, rhs| {
            rhs.timestamp
                .cmp(&lhs.timestamp)
                .then_with(|| rhs.backup_id.cmp(&lhs.backup_id))
        });
        Ok(manifests)
    }

    pub fn get_backup(&self, backup_id: &str) -> Result<BackupManifest> {
        check_name(backup_id)?;
        let path = self.root.join(backup_id).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(TokenError::BackupNotFound(backup_id.to_string()));
        }
        read_manifest(&path)
    }

    /// Deletes one backup.
    pub fn delete_backup(&self, backup_id: &str) -> Result<()> {
        check_name(backup_id)?;
        let folder = self.root.join(backup_id);
        if !folder.join(MANIFEST_FILE).is_file() {
            return Err(TokenError::BackupNotFound(backup_id.to_string()));
        }
        fs::remove_dir_all(folder)?;
        info!(backup_id, "backup deleted");
        Ok(())
    }

    /// Deletes the oldest backups of `operation_type` beyond the retention
    /// count and returns their ids.
    pub fn prune(&self, operation_type: &str) -> Result<Vec<String>> {
        self.prune_keeping(operation_type, &[])
    }

    /// Like [`prune`](Self::prune), but the ids in `keep` are never deleted
    /// and use up retention slots first.
    fn prune_keeping(&self, operation_type: &str, keep: &[&str]) -> Result<Vec<String>> {
        if self.retention == 0 {
            return Ok(Vec::new());
        }
        let (kept, candidates): (Vec<_>, Vec<_>) = self
            .list_backups(Some(operation_type))?
            .into_iter()
            .partition(|manifest| keep.contains(&manifest.backup_id.as_str()));
        let slots = self.retention.saturating_sub(kept.len());

        let mut deleted = Vec::new();
        for manifest in candidates.into_iter().skip(slots) {
            fs::remove_dir_all(self.root.join(&manifest.backup_id))?;
            deleted.push(manifest.backup_id);
        }
        Ok(deleted)
    }

    /// Restores the content of a backup over the live paths.
    ///
    /// Unless forced, refuses when a target path has disappeared or carries
    /// uncommitted changes. The current state is snapshotted first so the
    /// rollback can itself be rolled back; pruning after that snapshot never
    /// removes the backup being restored.
    #[instrument(level = "info", skip(self), fields(root = %self.root.display()))]
    pub fn rollback(&self, backup_id: &str, options: RollbackOptions) -> Result<RollbackReport> {
        let manifest = self.get_backup(backup_id)?;
        let folder = self.root.join(backup_id);

        let restorable: Vec<&BackedUpFile> = manifest
            .backed_up_files
            .iter()
            .filter(|file| folder.join(&file.stored).is_file())
            .collect();
        if restorable.is_empty() {
            return Err(TokenError::NothingToRestore(backup_id.to_string()));
        }

        if !options.force {
            let missing: Vec<String> = manifest
                .source_paths
                .iter()
                .filter(|path| !path.exists())
                .map(|path| path.display().to_string())
                .collect();
            if !missing.is_empty() {
                return Err(TokenError::RollbackRefused {
                    backup_id: backup_id.to_string(),
                    reason: format!("target paths no longer exist: {}", missing.join(", ")),
                });
            }

            let changed = self.probe.uncommitted_changes(&manifest.source_paths);
            if !changed.is_empty() {
                let changed: Vec<String> = changed.iter().map(|p| p.display().to_string()).collect();
                return Err(TokenError::RollbackRefused {
                    backup_id: backup_id.to_string(),
                    reason: format!("uncommitted changes in {}", changed.join(", ")),
                });
            }
        }

        let mut report = RollbackReport {
            backup_id: backup_id.to_string(),
            dry_run: options.dry_run,
            ..RollbackReport::default()
        };

        if options.dry_run {
            report.files = restorable.iter().map(|file| file.source.clone()).collect();
            info!(files = report.files.len(), "dry run, nothing restored");
            return Ok(report);
        }

        let current: Vec<PathBuf> = manifest
            .source_paths
            .iter()
            .filter(|path| path.exists())
            .cloned()
            .collect();
        if current.is_empty() {
            report
                .warnings
                .push("no current files exist; pre-rollback backup skipped".to_string());
        } else {
            let mut metadata = Map::new();
            metadata.insert("rollbackOf".to_string(), Value::String(backup_id.to_string()));
            match self.create_backup_keeping(PRE_ROLLBACK, &current, metadata, &[backup_id]) {
                Ok(snapshot) => report.pre_rollback_backup = Some(snapshot.backup_id),
                Err(error) => {
                    warn!(%error, "pre-rollback backup failed");
                    report
                        .warnings
                        .push(format!("pre-rollback backup failed: {error}"));
                }
            }
        }

        for file in restorable {
            match restore_file(&folder.join(&file.stored), &file.source) {
                Ok(()) => report.files.push(file.source.clone()),
                Err(error) => {
                    warn!(path = %file.source.display(), %error, "failed to restore file");
                    report
                        .errors
                        .push(format!("failed to restore {}: {error}", file.source.display()));
                }
            }
        }

        info!(
            restored = report.files.len(),
            failed = report.errors.len(),
            "rollback finished"
        );
        Ok(report)
    }
}

/// Backup ids and operation types name folders directly under the root.
fn check_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\'])
        && Path::new(name).is_relative();
    if plain {
        Ok(())
    } else {
        Err(TokenError::InvalidBackupName(name.to_string()))
    }
}

fn copy_into(source: &Path, folder: &Path, stored: PathBuf) -> Result<BackedUpFile> {
    let destination = folder.join(&stored);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let size = fs::copy(source, &destination)?;
    Ok(BackedUpFile {
        source: source.to_path_buf(),
        stored,
        size,
    })
}

fn restore_file(stored: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(stored, target)?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<BackupManifest> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
