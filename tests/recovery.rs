use std::fs;
use std::path::Path;

use aideon_tokens::backup::{BackupManager, NoChangeProbe};
use aideon_tokens::config::ThemeRules;
use aideon_tokens::recovery::{RecoveryAction, RecoveryOptions, attempt_partial_recovery};
use aideon_tokens::sync::validate_and_recover;
use aideon_tokens::validate::{IssueKind, validate_directory};
use serde_json::{Value, json};
use tempfile::tempdir;

fn write(path: &Path, value: &Value) {
    let text = serde_json::to_string_pretty(value).expect("serialisable");
    fs::write(path, text).expect("fixture written");
}

fn read(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("file readable");
    serde_json::from_str(&text).expect("valid JSON")
}

fn backups(workspace: &Path) -> BackupManager {
    BackupManager::new(workspace.join(".token-backups"), 10).with_probe(NoChangeProbe)
}

/// A directory whose metadata and themes are in order.
fn scaffold(dir: &Path) {
    fs::create_dir_all(dir).expect("token directory created");
    write(&dir.join("$metadata.json"), &json!({"tokenSetOrder": ["core"]}));
    write(
        &dir.join("$themes.json"),
        &json!([{"id": "default", "name": "Default", "selectedTokenSets": {"core": "source"}}]),
    );
}

#[test]
fn trailing_commas_are_repaired_after_a_backup() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    fs::write(
        tokens.join("core.json"),
        "{\"color\": {\"red\": {\"$type\": \"color\", \"$value\": \"#f00\"},},}",
    )
    .expect("broken fixture written");

    let rules = ThemeRules::default();
    let manager = backups(workspace.path());
    let report = validate_directory(&tokens, &rules);
    assert!(report.has(IssueKind::InvalidJson));

    let recovery = attempt_partial_recovery(&report, RecoveryOptions::default(), &manager, &rules);
    assert!(recovery.success, "{:?}", recovery.errors);
    assert!(recovery.backup_id.is_some());

    let item = recovery
        .items
        .iter()
        .find(|item| item.action == RecoveryAction::RepairJson)
        .expect("repair recorded");
    assert!(item.applied);
    assert_eq!(item.file.as_deref(), Some("core.json"));

    assert_eq!(
        read(&tokens.join("core.json")),
        json!({"color": {"red": {"$type": "color", "$value": "#f00"}}})
    );
    let revalidation = recovery.revalidation.expect("directory re-validated");
    assert!(revalidation.is_valid(), "{:#?}", revalidation.issues);
}

#[test]
fn missing_required_files_are_recreated() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    fs::create_dir_all(&tokens).expect("token directory created");
    write(
        &tokens.join("core.json"),
        &json!({"color": {"red": {"$type": "color", "$value": "#f00"}}}),
    );

    let rules = ThemeRules::default();
    let (report, recovery) =
        validate_and_recover(&tokens, RecoveryOptions::default(), &backups(workspace.path()), &rules);
    assert_eq!(report.of_kind(IssueKind::MissingRequiredFile).count(), 3);
    assert!(recovery.success, "{:?}", recovery.errors);

    let created: Vec<&str> = recovery
        .items
        .iter()
        .filter(|item| item.action == RecoveryAction::CreateDefault)
        .filter_map(|item| item.file.as_deref())
        .collect();
    assert_eq!(created, vec!["$metadata.json", "$themes.json"]);

    assert_eq!(read(&tokens.join("$metadata.json")), json!({"tokenSetOrder": []}));
    let themes = read(&tokens.join("$themes.json"));
    assert_eq!(themes[0]["id"], "default");
    assert!(themes[0]["selectedTokenSets"].is_object());
}

#[test]
fn missing_types_are_inferred_and_references_follow_their_target() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    write(
        &tokens.join("core.json"),
        &json!({
            "color": {"red": {"$value": "#f00"}},
            "space": {"$value": "8px"},
            "alarm": {"$value": "{color.red}"}
        }),
    );

    let rules = ThemeRules::default();
    let report = validate_directory(&tokens, &rules);
    assert_eq!(report.of_kind(IssueKind::MissingType).count(), 3);

    let recovery =
        attempt_partial_recovery(&report, RecoveryOptions::default(), &backups(workspace.path()), &rules);
    assert!(recovery.success, "{:?}", recovery.errors);

    let core = read(&tokens.join("core.json"));
    assert_eq!(core["color"]["red"]["$type"], "color");
    assert_eq!(core["space"]["$type"], "dimension");
    assert_eq!(core["alarm"]["$type"], "color");
    assert_eq!(core["alarm"]["$value"], "{color.red}");

    let keys: Vec<&String> = core["space"].as_object().expect("token object").keys().collect();
    assert_eq!(keys, vec!["$type", "$value"]);

    let revalidation = recovery.revalidation.expect("directory re-validated");
    assert!(!revalidation.has(IssueKind::MissingType));
}

#[test]
fn plan_only_leaves_the_directory_untouched() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    let broken = "{\"color\": {\"red\": {\"$value\": \"#f00\"},}}";
    fs::write(tokens.join("core.json"), broken).expect("broken fixture written");

    let rules = ThemeRules::default();
    let manager = backups(workspace.path());
    let report = validate_directory(&tokens, &rules);
    let options = RecoveryOptions {
        auto_fix: false,
        backup_first: true,
    };
    let recovery = attempt_partial_recovery(&report, options, &manager, &rules);

    assert!(recovery.dry_run);
    assert!(!recovery.items.is_empty());
    assert!(recovery.items.iter().all(|item| !item.applied));
    assert!(recovery.backup_id.is_none());
    assert!(recovery.revalidation.is_none());
    assert_eq!(fs::read_to_string(tokens.join("core.json")).expect("readable"), broken);
    assert!(manager.list_backups(None).expect("listed").is_empty());
}

#[test]
fn unresolved_references_get_suggestions_but_are_not_rewritten() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    let document = json!({
        "color": {"primary": {"$type": "color", "$value": "#00f"}},
        "link": {"$type": "color", "$value": "{color.primay}"}
    });
    write(&tokens.join("core.json"), &document);

    let rules = ThemeRules::default();
    let report = validate_directory(&tokens, &rules);
    assert!(report.has(IssueKind::UnresolvedReference));

    let recovery =
        attempt_partial_recovery(&report, RecoveryOptions::default(), &backups(workspace.path()), &rules);
    let item = recovery
        .items
        .iter()
        .find(|item| item.action == RecoveryAction::SuggestReference)
        .expect("suggestion recorded");
    assert!(!item.applied);
    assert_eq!(item.alternatives.first().map(String::as_str), Some("{color.primary}"));
    assert!(item.alternatives.len() <= 3);
    assert_eq!(read(&tokens.join("core.json")), document);
}

#[test]
fn a_clean_report_needs_no_recovery() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    write(
        &tokens.join("core.json"),
        &json!({"color": {"red": {"$type": "color", "$value": "#f00"}}}),
    );

    let rules = ThemeRules::default();
    let manager = backups(workspace.path());
    let report = validate_directory(&tokens, &rules);
    let recovery = attempt_partial_recovery(&report, RecoveryOptions::default(), &manager, &rules);

    assert!(recovery.success);
    assert!(recovery.items.is_empty());
    assert!(recovery.backup_id.is_none());
    assert!(manager.list_backups(None).expect("listed").is_empty());
}

#[test]
fn apostrophes_survive_a_bracket_repair() {
    let workspace = tempdir().expect("temporary directory");
    let tokens = workspace.path().join("tokens");
    scaffold(&tokens);
    fs::write(
        tokens.join("core.json"),
        "{\"color\": {\"red\": {\"$type\": \"color\", \"$value\": \"#f00\", \"$description\": \"it's Bob's\"}}",
    )
    .expect("broken fixture written");

    let rules = ThemeRules::default();
    let report = validate_directory(&tokens, &rules);
    assert!(report.has(IssueKind::InvalidJson));

    let recovery =
        attempt_partial_recovery(&report, RecoveryOptions::default(), &backups(workspace.path()), &rules);
    assert!(recovery.success, "{:?}", recovery.errors);
    assert!(
        recovery
            .items
            .iter()
            .all(|item| item.action != RecoveryAction::WriteSkeleton)
    );
    assert_eq!(
        read(&tokens.join("core.json")),
        json!({"color": {"red": {
            "$type": "color",
            "$value": "#f00",
            "$description": "it's Bob's"
        }}})
    );
}
