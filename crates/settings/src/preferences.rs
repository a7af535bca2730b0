use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use scribe_search::{SearchMode, SearchOptions};

const PREFERENCES_VERSION: u32 = 1;
const MAX_VIEWPORT_LINES: usize = 500;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub search: SearchPreferences,
    #[serde(default)]
    pub view: ViewPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            search: SearchPreferences::default(),
            view: ViewPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.view.sanitize();
    }
}

/// Default flags applied to every new find/replace session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPreferences {
    #[serde(default = "default_true")]
    pub regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub multi_line: bool,
    #[serde(default)]
    pub expand_captures: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SearchPreferences {
    fn default() -> Self {
        Self {
            regex: true,
            case_sensitive: false,
            whole_word: false,
            multi_line: false,
            expand_captures: false,
        }
    }
}

impl SearchPreferences {
    /// Builds search options for `pattern` from these defaults.
    pub fn to_options(&self, pattern: impl Into<String>) -> SearchOptions {
        let mut options = SearchOptions::new(pattern);
        options.mode = if self.regex {
            SearchMode::Regex
        } else {
            SearchMode::Plain
        };
        options.case_sensitive = self.case_sensitive;
        options.whole_word = self.whole_word;
        options.multi_line = self.multi_line;
        options.expand_captures = self.expand_captures;
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    #[serde(default = "default_viewport_lines")]
    pub viewport_lines: usize,
    #[serde(default = "default_marker_open")]
    pub marker_open: String,
    #[serde(default = "default_marker_close")]
    pub marker_close: String,
}

fn default_viewport_lines() -> usize {
    5
}

fn default_marker_open() -> String {
    "[[".to_string()
}

fn default_marker_close() -> String {
    "]]".to_string()
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            viewport_lines: default_viewport_lines(),
            marker_open: default_marker_open(),
            marker_close: default_marker_close(),
        }
    }
}

impl ViewPreferences {
    fn sanitize(&mut self) {
        if self.viewport_lines == 0 {
            self.viewport_lines = default_viewport_lines();
        }
        self.viewport_lines = self.viewport_lines.min(MAX_VIEWPORT_LINES);
        let unusable = |marker: &str| marker.is_empty() || marker.contains('\n');
        if unusable(&self.marker_open) || unusable(&self.marker_close) {
            self.marker_open = default_marker_open();
            self.marker_close = default_marker_close();
        }
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    /// Loads preferences from `path`; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "no preferences file; using defaults");
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let data = read_preferences(&path)?;
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn overwrite(&mut self, preferences: Preferences) -> Result<(), PreferencesError> {
        self.data = preferences;
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        ensure_parent(&self.path)?;
        let payload = serialize(&self.data, &self.path)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), PreferencesError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let payload = serialize(&self.data, &path)?;
        fs::write(&path, payload.as_bytes())
            .map_err(|source| PreferencesError::Write { path, source })
    }

    /// Replaces the stored preferences with the file at `source`, keeping a
    /// `.bak` copy of the previous file.
    pub fn import_from(&mut self, source: impl AsRef<Path>) -> Result<(), PreferencesError> {
        let data = read_preferences(source.as_ref())?;
        self.backup_existing()?;
        self.data = data;
        self.save()
    }

    fn backup_existing(&self) -> Result<(), PreferencesError> {
        if self.path.exists() {
            let backup = self.path.with_extension("bak");
            fs::copy(&self.path, &backup).map_err(|source| PreferencesError::Write {
                path: backup,
                source,
            })?;
        }
        Ok(())
    }
}

fn read_preferences(path: &Path) -> Result<Preferences, PreferencesError> {
    let contents = fs::read_to_string(path).map_err(|source| PreferencesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut data: Preferences =
        serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    data.sanitize();
    Ok(data)
}

fn serialize(data: &Preferences, path: &Path) -> Result<String, PreferencesError> {
    serde_json::to_string_pretty(data).map_err(|source| PreferencesError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), PreferencesError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_defaults_build_case_insensitive_regex() {
        let options = SearchPreferences::default().to_options("um");
        assert_eq!(options, SearchOptions::new("um"));
    }

    #[test]
    fn plain_preference_maps_to_plain_mode() {
        let prefs = SearchPreferences {
            regex: false,
            case_sensitive: true,
            whole_word: true,
            multi_line: true,
            expand_captures: false,
        };
        let options = prefs.to_options("a.b");
        assert_eq!(options.mode, SearchMode::Plain);
        assert!(options.case_sensitive);
        assert!(options.whole_word);
        assert!(options.multi_line);
    }

    #[test]
    fn sanitize_repairs_view_values() {
        let mut prefs = Preferences::default();
        prefs.version = 0;
        prefs.view.viewport_lines = 0;
        prefs.view.marker_open = String::new();
        prefs.sanitize();
        assert_eq!(prefs.version, PREFERENCES_VERSION);
        assert_eq!(prefs.view.viewport_lines, 5);
        assert_eq!(prefs.view.marker_open, "[[");
        assert_eq!(prefs.view.marker_close, "]]");

        prefs.view.viewport_lines = 10_000;
        prefs.sanitize();
        assert_eq!(prefs.view.viewport_lines, MAX_VIEWPORT_LINES);
    }
}
