//! Config load error-message, atomic-write-safety and snapshot document tests.

use assert_fs::prelude::*;
use nomina_core::{CoreError, PipelineConfig, SnapshotDocument, SourceKey};
use predicates::prelude::predicate;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn corrupt_config_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("debounce_ms: [not, a, number]\n").expect("write");

    let err = PipelineConfig::load_at(file.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn invalid_source_key_is_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("compile:\n  drop_keys: ['local:']\n").expect("write");

    let err = PipelineConfig::load_at(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("config.yaml"), "must contain file path, got: {msg}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_then_load_preserves_config_and_cleans_tmp() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("nested").child("config.yaml");

    let mut config = PipelineConfig::default();
    config.debounce_ms = 40;
    config.compile.drop_keys = vec![
        SourceKey::local("configured-project-version"),
        SourceKey::local("build-generation"),
    ];
    config.save_at(file.path()).expect("save");

    file.assert(predicate::path::exists());
    dir.child("nested")
        .child("config.yaml.tmp")
        .assert(predicate::path::missing());
    file.assert(predicate::str::contains("local:build-generation"));

    let loaded = PipelineConfig::load_at(file.path()).expect("load");
    assert_eq!(loaded, config);
}

// ---------------------------------------------------------------------------
// 3. Snapshot documents
// ---------------------------------------------------------------------------

#[test]
fn snapshot_document_missing_file_is_io_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = SnapshotDocument::load_at(&dir.path().join("net6.0.yaml")).unwrap_err();
    assert!(matches!(err, CoreError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("net6.0.yaml"));
}

#[test]
fn snapshot_document_empty_rules_are_allowed() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("net7.0.yaml");
    file.write_str("versions:\n  project-generation: 1\n").expect("write");

    let doc = SnapshotDocument::load_at(file.path()).expect("load");
    assert_eq!(doc.rules.rule_names().count(), 0);
    assert!(doc.rules.rule("PackageReference").items.is_empty());
}

#[test]
fn snapshot_directory_loads_yaml_documents_sorted_by_configuration() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("net7.0.yaml")
        .write_str("versions:\n  project-generation: 2\n")
        .expect("write");
    dir.child("net6.0.yml")
        .write_str("versions:\n  project-generation: 2\n")
        .expect("write");
    dir.child("notes.txt").write_str("ignored").expect("write");

    let docs = SnapshotDocument::load_dir(dir.path()).expect("load dir");
    let names: Vec<&str> = docs.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["net6.0", "net7.0"]);
}
