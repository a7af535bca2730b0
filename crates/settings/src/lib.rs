pub mod preferences;

pub use preferences::{
    Preferences, PreferencesError, PreferencesStore, SearchPreferences, ViewPreferences,
};
