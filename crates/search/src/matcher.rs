use std::ops::Range;
use std::slice;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::{SearchError, SearchMode, SearchOptions};

/// Half-open byte range `[start, start + len)` within a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchSpan {
    pub start: usize,
    pub len: usize,
}

impl MatchSpan {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns the matched slice, or `None` when the span does not fit `text`
    /// (out of bounds or not on char boundaries).
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.range())
    }

    pub fn fits(&self, text: &str) -> bool {
        self.slice(text).is_some()
    }
}

/// Ordered, non-overlapping matches derived from one (pattern, buffer) pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchSequence {
    spans: Vec<MatchSpan>,
}

impl MatchSequence {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<MatchSpan> {
        self.spans.get(index).copied()
    }

    pub fn iter(&self) -> slice::Iter<'_, MatchSpan> {
        self.spans.iter()
    }

    pub fn as_slice(&self) -> &[MatchSpan] {
        &self.spans
    }
}

impl<'a> IntoIterator for &'a MatchSequence {
    type Item = &'a MatchSpan;
    type IntoIter = slice::Iter<'a, MatchSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// A compiled search pattern.
#[derive(Clone, Debug)]
pub struct PatternMatcher {
    regex: Regex,
    whole_word: bool,
}

impl PatternMatcher {
    /// Compiles the options' pattern. Empty patterns are rejected.
    pub fn compile(options: &SearchOptions) -> Result<Self, SearchError> {
        options.validate()?;
        let source = match options.mode {
            SearchMode::Plain => regex::escape(&options.pattern),
            SearchMode::Regex => options.pattern.clone(),
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .multi_line(options.multi_line)
            .build()
            .map_err(|err| SearchError::InvalidPattern(err.to_string()))?;
        Ok(Self {
            regex,
            whole_word: options.whole_word,
        })
    }

    /// Scans `text` left to right. Each match consumes its span and the scan
    /// resumes strictly after it; zero-width matches are skipped.
    pub fn find_all(&self, text: &str) -> MatchSequence {
        let spans = self
            .regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .filter(|m| !self.whole_word || is_whole_word(text, m.start(), m.end()))
            .map(|m| MatchSpan::new(m.start(), m.len()))
            .collect();
        MatchSequence { spans }
    }

    /// Expands capture references in `replacement` against the match at `span`.
    /// Returns `None` if the pattern no longer matches exactly at that span.
    pub fn expand(&self, text: &str, span: MatchSpan, replacement: &str) -> Option<String> {
        if !span.fits(text) {
            return None;
        }
        let caps = self.regex.captures_at(text, span.start)?;
        let whole = caps.get(0)?;
        if whole.start() != span.start || whole.end() != span.end() {
            return None;
        }
        let mut expanded = String::new();
        caps.expand(replacement, &mut expanded);
        Some(expanded)
    }

    /// Expands `replacement` for the `index`-th span of `sequence`.
    ///
    /// Fails with `IndexOutOfRange` when the span is missing or the pattern no
    /// longer matches exactly there, so unexpanded references never reach the
    /// buffer.
    pub fn expand_match(
        &self,
        text: &str,
        sequence: &MatchSequence,
        index: usize,
        replacement: &str,
    ) -> Result<String, SearchError> {
        let out_of_range = SearchError::IndexOutOfRange {
            index,
            len: sequence.len(),
        };
        let span = sequence.get(index).ok_or_else(|| out_of_range.clone())?;
        self.expand(text, span, replacement).ok_or_else(|| {
            warn!(start = span.start, len = span.len, "capture expansion failed: span no longer matches");
            out_of_range
        })
    }

    /// Substitutes every match in a single pass over `text`. The replacement is
    /// never rescanned, so replacements that match the pattern do not cascade.
    pub(crate) fn substitute(&self, text: &str, replacement: &str, expand: bool) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut last = 0usize;
        let mut count = 0usize;
        for caps in self.regex.captures_iter(text) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            if m.is_empty() || (self.whole_word && !is_whole_word(text, m.start(), m.end())) {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            if expand {
                caps.expand(replacement, &mut out);
            } else {
                out.push_str(replacement);
            }
            last = m.end();
            count += 1;
        }
        out.push_str(&text[last..]);
        (out, count)
    }
}

/// Finds every match of the options' pattern in `buffer`.
///
/// An empty pattern yields an empty sequence rather than matching everywhere.
pub fn find_all(buffer: &str, options: &SearchOptions) -> Result<MatchSequence, SearchError> {
    if options.pattern.is_empty() {
        return Ok(MatchSequence::empty());
    }
    let matcher = PatternMatcher::compile(options)?;
    let sequence = matcher.find_all(buffer);
    debug!(
        pattern = %options.pattern,
        matches = sequence.len(),
        "scanned buffer of {} bytes",
        buffer.len()
    );
    Ok(sequence)
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let is_word = |ch: char| ch.is_alphanumeric() || ch == '_';
    let left = text[..start].chars().next_back().map_or(false, is_word);
    let right = text[end..].chars().next().map_or(false, is_word);
    !(left || right)
}
