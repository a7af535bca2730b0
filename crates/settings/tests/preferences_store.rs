use scribe_settings::{Preferences, PreferencesStore};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("scribe.json");

    let store = PreferencesStore::load(&path).expect("load defaults");
    let prefs = store.preferences();
    assert!(prefs.search.regex);
    assert!(!prefs.search.case_sensitive);
    assert_eq!(prefs.view.viewport_lines, 5);
    assert_eq!(prefs.view.marker_open, "[[");
    assert!(!path.exists(), "loading defaults must not create the file");
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("scribe.json");

    let mut store = PreferencesStore::new(path.clone(), Preferences::default());
    store
        .update(|prefs| {
            prefs.search.case_sensitive = true;
            prefs.search.whole_word = true;
            prefs.view.marker_open = ">>".to_string();
            prefs.view.marker_close = "<<".to_string();
        })
        .expect("save");

    let reloaded = PreferencesStore::load(&path).expect("reload");
    assert!(reloaded.preferences().search.case_sensitive);
    assert!(reloaded.preferences().search.whole_word);
    assert_eq!(reloaded.preferences().view.marker_open, ">>");
    assert_eq!(reloaded.preferences().view.marker_close, "<<");
}

#[test]
fn overwrite_sanitizes_values() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("scribe.json");

    let mut store = PreferencesStore::load(&path).expect("default");
    let mut prefs = store.preferences().clone();
    prefs.view.viewport_lines = 0;
    prefs.view.marker_close = "\n".to_string();
    prefs.search.regex = false;

    store.overwrite(prefs).expect("overwrite");

    let current = store.preferences();
    assert_eq!(current.view.viewport_lines, 5);
    assert_eq!(current.view.marker_close, "]]");
    assert!(!current.search.regex);
}

#[test]
fn partial_file_is_filled_with_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("scribe.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "search": { "case_sensitive": true }
        }"#,
    )
    .expect("write partial prefs");

    let store = PreferencesStore::load(&path).expect("load partial file");
    let prefs = store.preferences();
    assert_eq!(prefs.version, 1);
    assert!(prefs.search.case_sensitive);
    assert!(prefs.search.regex, "regex should default to enabled");
    assert_eq!(prefs.view.viewport_lines, 5);
}

#[test]
fn import_keeps_backup_of_previous_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("scribe.json");
    let incoming = temp.path().join("incoming.json");

    let mut store = PreferencesStore::new(path.clone(), Preferences::default());
    store.save().expect("initial save");
    fs::write(&incoming, r#"{ "search": { "whole_word": true } }"#).expect("write incoming");

    store.import_from(&incoming).expect("import");
    assert!(store.preferences().search.whole_word);
    assert!(path.with_extension("bak").exists());

    let exported = temp.path().join("export").join("out.json");
    store.export_to(&exported).expect("export");
    let reread = PreferencesStore::load(&exported).expect("reload export");
    assert_eq!(reread.preferences(), store.preferences());
}

#[test]
fn malformed_file_reports_parse_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("scribe.json");
    fs::write(&path, "{ not json").expect("write");
    let err = PreferencesStore::load(&path).unwrap_err();
    assert!(err.to_string().starts_with("failed to parse preferences"));
}
