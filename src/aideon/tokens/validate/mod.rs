//! Validators over a modular token directory.
//!
//! Validators never fail: each returns a [`ValidationReport`] whose issues
//! carry a severity, the file and token path involved, and a suggestion.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aideon::tokens::config::ThemeRules;

pub mod references;
pub mod roundtrip;
pub mod structure;
pub mod themes;

pub use references::validate_references;
pub use roundtrip::validate_roundtrip;
pub use structure::{validate_file, validate_structure};
pub use themes::validate_themes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Broad error taxonomy every issue kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    FileSystem,
    Parse,
    Structural,
    Reference,
    Preservation,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FileUnreadable,
    MissingRequiredFile,
    InvalidJson,
    InvalidMetadata,
    MissingTokenSetFile,
    OrphanedFile,
    InvalidTheme,
    MissingValue,
    MissingType,
    EmptyGroup,
    InvalidReference,
    UnresolvedReference,
    LegacyReference,
    CompatibilityReference,
    CircularReference,
    RoundtripSkipped,
    MissingKey,
    ExtraKey,
    ValueMismatch,
    TypeInferred,
    DescriptionLost,
    ReferenceLost,
    MissingTokenSet,
    ThemeReferencesUnknownSet,
    MissingSourceSet,
    RecommendedSetNotEnabled,
    OrphanedTokenSet,
}

impl IssueKind {
    pub fn category(&self) -> IssueCategory {
        match self {
            IssueKind::FileUnreadable => IssueCategory::FileSystem,
            IssueKind::InvalidJson => IssueCategory::Parse,
            IssueKind::MissingRequiredFile
            | IssueKind::InvalidMetadata
            | IssueKind::MissingTokenSetFile
            | IssueKind::OrphanedFile
            | IssueKind::InvalidTheme
            | IssueKind::MissingValue
            | IssueKind::MissingType
            | IssueKind::EmptyGroup
            | IssueKind::MissingTokenSet
            | IssueKind::ThemeReferencesUnknownSet
            | IssueKind::MissingSourceSet
            | IssueKind::RecommendedSetNotEnabled
            | IssueKind::OrphanedTokenSet => IssueCategory::Structural,
            IssueKind::InvalidReference
            | IssueKind::UnresolvedReference
            | IssueKind::LegacyReference
            | IssueKind::CompatibilityReference
            | IssueKind::CircularReference => IssueCategory::Reference,
            IssueKind::RoundtripSkipped
            | IssueKind::MissingKey
            | IssueKind::ExtraKey
            | IssueKind::ValueMismatch
            | IssueKind::TypeInferred
            | IssueKind::DescriptionLost
            | IssueKind::ReferenceLost => IssueCategory::Preservation,
        }
    }
}

/// Displays the serialised snake_case name.
impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    /// File relative to the validated directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Dotted token path inside `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            file: None,
            path: None,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, message)
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn category(&self) -> IssueCategory {
        self.kind.category()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.kind)?;
        if let Some(file) = &self.file {
            write!(f, " {file}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " ({path})")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Issues produced by one or more validators over a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validators: Vec<String>,
    pub directory: PathBuf,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new(validator: impl Into<String>, directory: &Path) -> Self {
        Self {
            validators: vec![validator.into()],
            directory: directory.to_path_buf(),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Folds another report over the same directory into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.validators.extend(other.validators);
        self.issues.extend(other.issues);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// A report is valid when it holds no errors.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} error(s), {} warning(s), {} info",
            self.validators.join("+"),
            self.error_count(),
            self.warning_count(),
            self.count(Severity::Info)
        )
    }
}

/// Runs the structural, reference and theme validators over `dir`.
pub fn validate_directory(dir: &Path, rules: &ThemeRules) -> ValidationReport {
    let mut report = validate_structure(dir);
    report.merge(validate_references(dir));
    report.merge(validate_themes(dir, rules));
    report
}

/// Runs every validator, including the roundtrip check against the
/// directory's own consolidated form.
pub fn validate_all(dir: &Path, rules: &ThemeRules) -> ValidationReport {
    let mut report = validate_directory(dir, rules);
    report.merge(validate_roundtrip(dir, None));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serialises_with_type_field() {
        let issue = Issue::warning(IssueKind::ThemeReferencesUnknownSet, "unknown set")
            .in_file("$themes.json");
        let value = serde_json::to_value(&issue).expect("serialisable");
        assert_eq!(value["type"], "theme_references_unknown_set");
        assert_eq!(value["severity"], "warning");
        assert!(value.get("path").is_none());
    }

    #[test]
    fn issue_kinds_display_their_serialised_name() {
        for kind in [
            IssueKind::MissingRequiredFile,
            IssueKind::InvalidJson,
            IssueKind::ThemeReferencesUnknownSet,
            IssueKind::RecommendedSetNotEnabled,
        ] {
            let serialised = serde_json::to_value(kind).expect("serialisable");
            assert_eq!(serialised, serde_json::Value::String(kind.to_string()));
        }
        assert_eq!(IssueKind::MissingType.to_string(), "missing_type");
    }

    #[test]
    fn report_counts_by_severity() {
        let mut report = ValidationReport::new("structure", Path::new("tokens"));
        report.push(Issue::error(IssueKind::MissingValue, "no value"));
        report.push(Issue::warning(IssueKind::MissingType, "no type"));
        assert!(!report.is_valid());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(
            report.summary(),
            "structure: 1 error(s), 1 warning(s), 0 info"
        );
    }
}
