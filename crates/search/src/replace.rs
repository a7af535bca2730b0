use tracing::debug;

use crate::{MatchSequence, MatchSpan, PatternMatcher, SearchError, SearchOptions};

/// Result of replacing a single match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceOneOutcome {
    pub text: String,
    /// The span of the original buffer that was replaced.
    pub consumed: MatchSpan,
}

/// Result of a `replace_all` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceAllOutcome {
    pub text: String,
    pub replacements: usize,
}

/// Replaces exactly the span at `sequence[index]` and returns the new buffer.
///
/// Bytes outside the span are copied unchanged. Offsets of later matches are
/// not re-derived; callers rescan the returned text.
pub fn replace_one(
    buffer: &str,
    sequence: &MatchSequence,
    index: usize,
    replacement: &str,
) -> Result<ReplaceOneOutcome, SearchError> {
    let out_of_range = SearchError::IndexOutOfRange {
        index,
        len: sequence.len(),
    };
    let span = sequence.get(index).ok_or_else(|| out_of_range.clone())?;
    // A span from another buffer version must not be applied.
    if !span.fits(buffer) {
        return Err(out_of_range);
    }

    let mut text = String::with_capacity(buffer.len() - span.len + replacement.len());
    text.push_str(&buffer[..span.start]);
    text.push_str(replacement);
    text.push_str(&buffer[span.end()..]);
    debug!(index, start = span.start, len = span.len, "replaced single match");
    Ok(ReplaceOneOutcome {
        text,
        consumed: span,
    })
}

/// Replaces every non-overlapping match of the options' pattern in one pass
/// over `buffer`.
pub fn replace_all(
    buffer: &str,
    options: &SearchOptions,
    replacement: &str,
) -> Result<ReplaceAllOutcome, SearchError> {
    let matcher = PatternMatcher::compile(options)?;
    let (text, replacements) = matcher.substitute(buffer, replacement, options.expand_captures);
    debug!(pattern = %options.pattern, replacements, "replaced all matches");
    Ok(ReplaceAllOutcome { text, replacements })
}
