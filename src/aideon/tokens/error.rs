use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Error type covering the failures that abort an operation outright.
///
/// Validation problems are never expressed through this type: validators
/// accumulate [`Issue`](crate::validate::Issue)s instead, and the transformers
/// fold per-set failures into their outcome's `errors` list.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a directory walk fails part way through.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Raised when the layered configuration cannot be built or deserialised.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Raised when a document does not follow the token file conventions.
    #[error("invalid token document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// Raised when a string is not of the `{dot.separated.path}` form.
    #[error("invalid reference '{0}'")]
    InvalidReference(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input path not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when no manifest exists for the requested backup.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// Raised when a backup id or operation type is not a plain folder name.
    #[error("invalid backup name '{0}'")]
    InvalidBackupName(String),

    /// Raised when a backup holds no file that could be restored.
    #[error("backup {0} contains no files to restore")]
    NothingToRestore(String),

    /// Raised when a rollback precondition fails and `force` was not given.
    #[error("rollback of {backup_id} refused: {reason}")]
    RollbackRefused { backup_id: String, reason: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
