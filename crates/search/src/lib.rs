//! Find and replace engine used by the Scribe transcript editor.
//!
//! The engine is host-agnostic: [`find_all`] scans a buffer for a pattern and
//! produces an ordered [`MatchSequence`], [`MatchCursor`] walks that sequence
//! as a ring, and the replace helpers return new buffers without touching the
//! caller's text. Highlighting and editor wiring live in `scribe_core`.

mod cursor;
mod lines;
mod matcher;
mod replace;

pub use cursor::{step, Direction, MatchCounter, MatchCursor};
pub use lines::LineIndex;
pub use matcher::{find_all, MatchSequence, MatchSpan, PatternMatcher};
pub use replace::{replace_all, replace_one, ReplaceAllOutcome, ReplaceOneOutcome};

use thiserror::Error;

/// Error conditions raised by the search engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search pattern cannot be empty")]
    EmptyPattern,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("match index {index} is out of range for {len} matches")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Determines how the search pattern is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    Plain,
    #[default]
    Regex,
}

/// Options supplied to the search engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    pub pattern: String,
    pub mode: SearchMode,
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Let `^` and `$` match at every line boundary instead of only at the
    /// buffer edges.
    pub multi_line: bool,
    /// Expand `$1` / `${name}` references in the replacement text.
    pub expand_captures: bool,
}

impl SearchOptions {
    /// Creates a case-insensitive regex search for the given pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Regex,
            case_sensitive: false,
            whole_word: false,
            multi_line: false,
            expand_captures: false,
        }
    }

    /// Returns a copy of these options bound to another pattern.
    pub fn with_pattern(&self, pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.pattern.is_empty() {
            return Err(SearchError::EmptyPattern);
        }
        Ok(())
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(String::new())
    }
}
