use std::fs;
use std::path::Path;

use aideon_tokens::consolidate::consolidate;
use aideon_tokens::io::modular::set_file_path;
use aideon_tokens::split::split;
use aideon_tokens::validate::{IssueKind, validate_roundtrip};
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

fn mixed_document() -> Value {
    json!({
        "color": {
            "primary": {"$type": "color", "$value": "#ff0000", "$description": "Brand red"},
            "muted": {"type": "color", "value": "#888888"}
        },
        "spacing": {"sm": {"$value": "4px"}, "md": {"$type": "dimension", "$value": "8px"}},
        "semantic": {"danger": {"$type": "color", "$value": "{color.primary}"}},
        "button": {"padding": {"$type": "dimension", "$value": "{spacing.sm} * 2"}},
        "illustration": {"stroke": {"$type": "dimension", "$value": "2px"}}
    })
}

#[test]
fn color_primary_splits_into_core_and_consolidates_identically() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    let original = json!({"color": {"primary": {"$type": "color", "$value": "#ff0000"}}});
    write(&source, &original);

    let tokens_dir = dir.path().join("tokens");
    let outcome = split(&source, &tokens_dir);
    assert!(outcome.success, "split failed: {:?}", outcome.errors);

    let core = read(&tokens_dir.join("core.json"));
    assert_eq!(core, original);
    let metadata = read(&tokens_dir.join("$metadata.json"));
    assert_eq!(metadata["tokenSetOrder"], json!(["core"]));

    let output = dir.path().join("consolidated.json");
    let consolidated = consolidate(&tokens_dir, &output);
    assert!(consolidated.success, "consolidate failed: {:?}", consolidated.errors);
    assert_eq!(consolidated.tokens_count, 1);

    let document = read(&output);
    assert_eq!(document["color"], original["color"]);
}

#[test]
fn split_is_deterministic() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    write(&source, &mixed_document());

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    assert!(split(&source, &first).success);
    assert!(split(&source, &second).success);

    let mut compared = 0;
    for entry in fs::read_dir(&first).expect("split output listed") {
        let entry = entry.expect("directory entry");
        let name = entry.file_name();
        let lhs = fs::read(entry.path()).expect("first output readable");
        let rhs = fs::read(second.join(&name)).expect("second output readable");
        assert_eq!(lhs, rhs, "{name:?} differs between runs");
        compared += 1;
    }
    assert!(compared >= 3);
}

#[test]
fn every_listed_set_has_a_file() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    write(&source, &mixed_document());

    let tokens_dir = dir.path().join("tokens");
    let outcome = split(&source, &tokens_dir);
    assert!(outcome.success, "split failed: {:?}", outcome.errors);

    let metadata = read(&tokens_dir.join("$metadata.json"));
    let order: Vec<&str> = metadata["tokenSetOrder"]
        .as_array()
        .expect("order is an array")
        .iter()
        .map(|set| set.as_str().expect("set name"))
        .collect();
    assert_eq!(order, vec!["core", "global", "components", "extended"]);
    for set in order {
        assert!(set_file_path(&tokens_dir, set).is_file(), "{set} has no file");
    }
}

#[test]
fn split_normalises_leaves_and_keeps_references() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    write(&source, &mixed_document());

    let tokens_dir = dir.path().join("tokens");
    assert!(split(&source, &tokens_dir).success);

    let core = read(&tokens_dir.join("core.json"));
    assert_eq!(core["color"]["muted"], json!({"$type": "color", "$value": "#888888"}));
    assert_eq!(core["spacing"]["sm"]["$type"], "dimension");
    assert_eq!(core["color"]["primary"]["$description"], "Brand red");

    let global = read(&tokens_dir.join("global.json"));
    assert_eq!(global["semantic"]["danger"]["$value"], "{color.primary}");

    let components = read(&tokens_dir.join("components.json"));
    assert_eq!(components["button"]["padding"]["$value"], "{spacing.sm} * 2");
}

#[test]
fn roundtrip_validator_accepts_a_lossless_split() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    write(&source, &mixed_document());

    let tokens_dir = dir.path().join("tokens");
    assert!(split(&source, &tokens_dir).success);

    let report = validate_roundtrip(&tokens_dir, Some(&source));
    assert!(report.is_valid(), "{:#?}", report.issues);
    assert!(!report.has(IssueKind::RoundtripSkipped));
    // Untyped tokens are normalised, which is reported but not an error.
    assert!(report.has(IssueKind::TypeInferred));
    assert!(!report.has(IssueKind::DescriptionLost));
    assert!(!report.has(IssueKind::ReferenceLost));

    // The scratch directory does not outlive the check.
    let leftovers: Vec<_> = fs::read_dir(&tokens_dir)
        .expect("directory listed")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".roundtrip-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn modular_documents_split_by_identity() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("tokens.json");
    let themes = json!([
        {"id": "light", "name": "Light", "selectedTokenSets": {"core": "source", "brand": "enabled"}}
    ]);
    write(
        &source,
        &json!({
            "core": {"color": {"blue": {"$type": "color", "$value": "#0000ff"}}},
            "brand": {"color": {"accent": {"$type": "color", "$value": "{color.blue}"}}},
            "$themes": themes,
            "$metadata": {"tokenSetOrder": ["core", "brand"]}
        }),
    );

    let tokens_dir = dir.path().join("tokens");
    let outcome = split(&source, &tokens_dir);
    assert!(outcome.success, "split failed: {:?}", outcome.errors);
    assert!(tokens_dir.join("brand.json").is_file());
    assert_eq!(read(&tokens_dir.join("$themes.json")), themes);
    assert_eq!(
        read(&tokens_dir.join("brand.json")),
        json!({"color": {"accent": {"$type": "color", "$value": "{color.blue}"}}})
    );

    let report = validate_roundtrip(&tokens_dir, Some(&source));
    assert!(report.is_valid(), "{:#?}", report.issues);
}

#[test]
fn missing_original_is_reported_as_skipped() {
    let dir = tempdir().expect("temporary directory");
    let report = validate_roundtrip(dir.path(), Some(&dir.path().join("absent.json")));
    assert!(report.has(IssueKind::RoundtripSkipped));
    assert!(report.is_valid());
}

#[test]
fn groups_named_after_sets_keep_their_nesting_across_cycles() {
    let dir = tempdir().expect("temporary directory");
    let original = json!({
        "components": {"button": {"bg": {"$type": "color", "$value": "#000000"}}}
    });
    let mut current = dir.path().join("tokens.json");
    write(&current, &original);

    for cycle in 0..2 {
        let tokens_dir = dir.path().join(format!("tokens-{cycle}"));
        let split_outcome = split(&current, &tokens_dir);
        assert!(split_outcome.success, "split failed: {:?}", split_outcome.errors);
        assert_eq!(read(&tokens_dir.join("components.json")), original);

        let output = dir.path().join(format!("consolidated-{cycle}.json"));
        let outcome = consolidate(&tokens_dir, &output);
        assert!(outcome.success, "consolidate failed: {:?}", outcome.errors);
        current = output;
    }

    let mut restored = read(&current);
    let map = restored.as_object_mut().expect("object document");
    map.remove("$metadata");
    map.remove("$themes");
    assert_eq!(restored, original);
}
