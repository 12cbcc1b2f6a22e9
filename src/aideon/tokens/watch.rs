//! Edit sessions: poll a modular directory for changes and re-validate the
//! files that changed.

use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::aideon::tokens::config::WatchSettings;
use crate::aideon::tokens::error::Result;
use crate::aideon::tokens::validate::{ValidationReport, validate_file, validate_structure};

/// A file of the watched directory that changed since the previous poll.
/// Paths are relative to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(String),
    Modified(String),
    Removed(String),
}

impl ChangeEvent {
    pub fn file(&self) -> &str {
        match self {
            ChangeEvent::Created(file) | ChangeEvent::Modified(file) | ChangeEvent::Removed(file) => {
                file
            }
        }
    }
}

/// Source of change notifications for an edit session.
pub trait ChangeSource {
    /// Changes observed since the previous call.
    fn poll_changes(&mut self) -> Result<Vec<ChangeEvent>>;
}

/// Compares file modification times between polls.
pub struct PollingChangeSource {
    dir: PathBuf,
    seen: HashMap<String, SystemTime>,
}

impl PollingChangeSource {
    /// Takes the initial snapshot; files already present are not reported.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let seen = snapshot(&dir)?;
        Ok(Self { dir, seen })
    }
}

impl ChangeSource for PollingChangeSource {
    fn poll_changes(&mut self) -> Result<Vec<ChangeEvent>> {
        let current = snapshot(&self.dir)?;
        let mut changes = Vec::new();

        for (file, modified) in &current {
            match self.seen.get(file) {
                None => changes.push(ChangeEvent::Created(file.clone())),
                Some(previous) if modified > previous => {
                    changes.push(ChangeEvent::Modified(file.clone()))
                }
                Some(_) => {}
            }
        }
        for file in self.seen.keys() {
            if !current.contains_key(file) {
                changes.push(ChangeEvent::Removed(file.clone()));
            }
        }

        changes.sort_by(|lhs, rhs| lhs.file().cmp(rhs.file()));
        self.seen = current;
        Ok(changes)
    }
}

/// Modification time of every JSON file under `dir`, hidden entries skipped.
fn snapshot(dir: &Path) -> Result<HashMap<String, SystemTime>> {
    let mut files = HashMap::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
    });
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        if !entry.file_type().is_file() || !is_json {
            continue;
        }
        let modified = fs::metadata(path)?.modified()?;
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        files.insert(relative, modified);
    }
    Ok(files)
}

/// What one tick of an edit session observed.
#[derive(Debug, Clone)]
pub struct WatchUpdate {
    pub tick: usize,
    pub changes: Vec<ChangeEvent>,
    /// Validation of the changed files only.
    pub report: ValidationReport,
}

/// A poll loop over one token directory. Each tick with changes produces a
/// [`WatchUpdate`] handed to the caller's callback.
pub struct EditSession {
    dir: PathBuf,
    interval: Duration,
    source: Box<dyn ChangeSource>,
}

impl EditSession {
    pub fn new(dir: impl Into<PathBuf>, settings: &WatchSettings) -> Result<Self> {
        let dir = dir.into();
        let source = PollingChangeSource::new(&dir)?;
        Ok(Self {
            dir,
            interval: Duration::from_millis(settings.interval_ms),
            source: Box::new(source),
        })
    }

    pub fn with_source(mut self, source: impl ChangeSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs one poll and validates what changed. Returns `None` when nothing did.
    pub fn tick(&mut self, tick: usize) -> Result<Option<WatchUpdate>> {
        let changes = self.source.poll_changes()?;
        if changes.is_empty() {
            return Ok(None);
        }

        let mut report = ValidationReport::new("watch", &self.dir);
        let mut structure_checked = false;
        for change in &changes {
            match change {
                ChangeEvent::Created(file) | ChangeEvent::Modified(file) => {
                    report.merge(validate_file(&self.dir, file));
                }
                ChangeEvent::Removed(_) if !structure_checked => {
                    structure_checked = true;
                    report.merge(validate_structure(&self.dir));
                }
                ChangeEvent::Removed(_) => {}
            }
        }
        debug!(tick, changes = changes.len(), issues = report.issues.len(), "tick validated");
        Ok(Some(WatchUpdate {
            tick,
            changes,
            report,
        }))
    }

    /// Polls until the callback breaks or `max_ticks` polls have run, and
    /// returns the number of polls made.
    #[instrument(
        level = "info",
        skip_all,
        fields(dir = %self.dir.display(), interval_ms = self.interval.as_millis() as u64)
    )]
    pub fn run<F>(&mut self, max_ticks: Option<usize>, mut on_update: F) -> Result<usize>
    where
        F: FnMut(&WatchUpdate) -> ControlFlow<()>,
    {
        let mut ticks = 0;
        loop {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            if ticks > 0 {
                thread::sleep(self.interval);
            }
            ticks += 1;
            if let Some(update) = self.tick(ticks)? {
                if on_update(&update).is_break() {
                    break;
                }
            }
        }
        info!(ticks, "edit session stopped");
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct Scripted(VecDeque<Vec<ChangeEvent>>);

    impl ChangeSource for Scripted {
        fn poll_changes(&mut self) -> Result<Vec<ChangeEvent>> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn polling_reports_created_and_removed_files() {
        let dir = tempdir().expect("temporary directory");
        fs::write(dir.path().join("core.json"), "{}").expect("core written");
        let mut source = PollingChangeSource::new(dir.path()).expect("initial snapshot");
        assert!(source.poll_changes().expect("poll").is_empty());

        fs::write(dir.path().join("global.json"), "{}").expect("global written");
        fs::remove_file(dir.path().join("core.json")).expect("core removed");
        fs::create_dir(dir.path().join(".hidden")).expect("hidden dir created");
        fs::write(dir.path().join(".hidden/skip.json"), "{}").expect("hidden file written");

        let changes = source.poll_changes().expect("poll");
        assert_eq!(
            changes,
            vec![
                ChangeEvent::Removed("core.json".into()),
                ChangeEvent::Created("global.json".into()),
            ]
        );
    }

    #[test]
    fn session_validates_changed_files_until_the_callback_stops() {
        let dir = tempdir().expect("temporary directory");
        fs::write(dir.path().join("core.json"), "{\"a\": {\"$value\": 1},}").expect("core written");

        let script = VecDeque::from(vec![
            Vec::new(),
            vec![ChangeEvent::Modified("core.json".into())],
            vec![ChangeEvent::Modified("core.json".into())],
        ]);
        let mut session = EditSession::new(dir.path(), &WatchSettings::default())
            .expect("session")
            .with_source(Scripted(script))
            .with_interval(Duration::from_millis(1));

        let mut seen = Vec::new();
        let ticks = session
            .run(Some(10), |update| {
                seen.push((update.tick, update.report.error_count()));
                ControlFlow::Break(())
            })
            .expect("session runs");

        assert_eq!(ticks, 2);
        assert_eq!(seen, vec![(2, 1)]);
    }
}
