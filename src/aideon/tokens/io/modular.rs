//! Layout of a modular token directory: `$metadata.json`, `$themes.json`
//! and one JSON file per token set.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::aideon::tokens::error::{Result, TokenError};
use crate::aideon::tokens::io::json::read_json;
use crate::aideon::tokens::model::{Metadata, TokenGroup, TokenSet, TokenSets};

/// File recording the token-set order.
pub const METADATA_FILE: &str = "$metadata.json";
/// File holding the theme definitions.
pub const THEMES_FILE: &str = "$themes.json";

/// Fixed set name → file name table.
pub const SET_FILES: &[(&str, &str)] = &[
    ("core", "core.json"),
    ("global", "global.json"),
    ("simulate", "simulate.json"),
    ("components", "components.json"),
    ("extended", "extended.json"),
];

/// Returns the file name, relative to the modular directory, that stores `set`.
/// Set names outside the fixed table map to `<name>.json`; a `/` in the name
/// becomes a sub-directory.
pub fn set_file_name(set: &str) -> String {
    SET_FILES
        .iter()
        .find(|(name, _)| *name == set)
        .map(|(_, file)| (*file).to_string())
        .unwrap_or_else(|| format!("{set}.json"))
}

/// Inverse of [`set_file_name`].
pub fn set_name_for_file(file: &str) -> String {
    let file = file.replace('\\', "/");
    SET_FILES
        .iter()
        .find(|(_, name)| *name == file)
        .map(|(set, _)| (*set).to_string())
        .unwrap_or_else(|| file.trim_end_matches(".json").to_string())
}

pub fn set_file_path(dir: &Path, set: &str) -> PathBuf {
    dir.join(set_file_name(set))
}

/// Reads `$metadata.json` from a modular directory.
pub fn load_metadata(dir: &Path) -> Result<Metadata> {
    let value = read_json(&dir.join(METADATA_FILE))?;
    serde_json::from_value(value).map_err(|err| TokenError::InvalidDocument {
        path: dir.join(METADATA_FILE),
        reason: err.to_string(),
    })
}

/// Reads `$themes.json` verbatim.
pub fn load_themes(dir: &Path) -> Result<Value> {
    read_json(&dir.join(THEMES_FILE))
}

/// Lists every set file of the directory, relative to it, sorted. Hidden
/// entries (names starting with `.`) are skipped, which keeps backups and
/// scratch directories out of the listing, and so is `exclude` when given.
pub fn list_set_files(dir: &Path, exclude: Option<&Path>) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).follow_links(false).into_iter();
    for entry in walker.filter_entry(|entry| {
        let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
        let excluded = exclude.is_some_and(|excluded| entry.path().starts_with(excluded));
        !hidden && !excluded
    }) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if relative == METADATA_FILE || relative == THEMES_FILE {
            continue;
        }
        files.push(relative);
    }
    files.sort();
    Ok(files)
}

/// A set that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub set: String,
    pub file: String,
    pub error: TokenError,
}

/// Loads the sets named in `order`, in that order. Failures are returned next
/// to the sets that did load so callers can carry on with partial data.
pub fn load_sets(dir: &Path, order: &[String]) -> (TokenSets, Vec<LoadFailure>) {
    let mut sets = Vec::new();
    let mut failures = Vec::new();

    for set in order {
        let file = set_file_name(set);
        match read_json(&dir.join(&file)) {
            Ok(Value::Object(map)) => {
                debug!(set = %set, file = %file, "loaded token set");
                sets.push(TokenSet {
                    name: set.clone(),
                    file,
                    document: TokenGroup::from_map(&map),
                });
            }
            Ok(_) => {
                warn!(set = %set, file = %file, "token set file is not a JSON object");
                failures.push(LoadFailure {
                    set: set.clone(),
                    error: TokenError::InvalidDocument {
                        path: dir.join(&file),
                        reason: "expected a JSON object at the document root".into(),
                    },
                    file,
                });
            }
            Err(error) => {
                warn!(set = %set, file = %file, %error, "failed to load token set");
                failures.push(LoadFailure {
                    set: set.clone(),
                    file,
                    error,
                });
            }
        }
    }

    (TokenSets::new(sets), failures)
}

/// Loads the sets of a modular directory using its metadata order, falling
/// back to every set file on disk when the metadata is unusable.
pub fn load_directory(dir: &Path) -> (TokenSets, Vec<LoadFailure>) {
    let order = match load_metadata(dir) {
        Ok(metadata) => metadata.token_set_order,
        Err(error) => {
            debug!(%error, "metadata unavailable, loading every set file");
            list_set_files(dir, None)
                .unwrap_or_default()
                .iter()
                .map(|file| set_name_for_file(file))
                .collect()
        }
    };
    load_sets(dir, &order)
}
