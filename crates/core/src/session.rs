use scribe_search::{
    replace_all, replace_one, Direction, MatchCounter, MatchCursor, MatchSequence, MatchSpan,
    PatternMatcher, ReplaceAllOutcome, ReplaceOneOutcome, SearchError, SearchOptions,
};
use tracing::{debug, warn};

use crate::highlight::{HighlightProjector, Projection};
use crate::surface::{EditorSurface, HighlightLayer};

/// State of one open find/replace panel.
///
/// Matches are derived from the buffer last handed to [`refresh`](Self::refresh);
/// the host calls `refresh` whenever its text changes.
#[derive(Debug, Clone, Default)]
pub struct FindReplaceSession {
    options: SearchOptions,
    replacement: String,
    matcher: Option<PatternMatcher>,
    cursor: MatchCursor,
    projector: HighlightProjector,
    scanned: String,
    last_error: Option<SearchError>,
}

impl FindReplaceSession {
    /// Creates a session that has not scanned anything yet.
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Opens a session, seeding the pattern from the surface's selection when
    /// there is one, and runs the initial scan.
    pub fn open<S>(surface: &mut S, template: SearchOptions) -> Self
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        let options = match surface.selected_text() {
            Some(selected) => template.with_pattern(selected),
            None => template,
        };
        let mut session = Self::new(options);
        // Errors are recorded in `last_error`.
        let _ = session.refresh(surface);
        session
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn pattern(&self) -> &str {
        &self.options.pattern
    }

    /// Replaces the options and rescans.
    pub fn set_options<S>(&mut self, surface: &mut S, options: SearchOptions) -> Result<usize, SearchError>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.options = options;
        self.refresh(surface)
    }

    pub fn set_pattern<S>(&mut self, surface: &mut S, pattern: impl Into<String>) -> Result<usize, SearchError>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.options.pattern = pattern.into();
        self.refresh(surface)
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn set_replacement(&mut self, replacement: impl Into<String>) {
        self.replacement = replacement.into();
    }

    /// Rescans the surface text, re-anchors the cursor on the first match and
    /// highlights it. Returns the number of matches.
    ///
    /// An invalid pattern leaves an empty sequence behind and is recorded in
    /// [`last_error`](Self::last_error).
    pub fn refresh<S>(&mut self, surface: &mut S) -> Result<usize, SearchError>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.scanned = surface.text();
        let sequence = if self.options.pattern.is_empty() {
            self.matcher = None;
            MatchSequence::empty()
        } else {
            match PatternMatcher::compile(&self.options) {
                Ok(matcher) => {
                    let sequence = matcher.find_all(&self.scanned);
                    self.matcher = Some(matcher);
                    sequence
                }
                Err(err) => {
                    debug!(pattern = %self.options.pattern, error = %err, "pattern rejected");
                    self.matcher = None;
                    self.cursor.clear();
                    self.projector.clear(surface);
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        };

        self.last_error = None;
        self.cursor.reset(sequence);
        debug!(pattern = %self.options.pattern, matches = self.cursor.len(), "search refreshed");
        self.project(surface);
        Ok(self.cursor.len())
    }

    /// Moves to the next match (wrapping) and highlights it.
    pub fn next<S>(&mut self, surface: &mut S) -> Option<usize>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.navigate(surface, Direction::Next)
    }

    /// Moves to the previous match (wrapping) and highlights it.
    pub fn previous<S>(&mut self, surface: &mut S) -> Option<usize>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.navigate(surface, Direction::Previous)
    }

    fn navigate<S>(&mut self, surface: &mut S, direction: Direction) -> Option<usize>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        if self.is_stale(surface) {
            debug!("buffer changed since last scan; re-anchoring");
            let _ = self.refresh(surface);
            return self.cursor.index();
        }
        let index = self.cursor.advance(direction)?;
        self.project(surface);
        Some(index)
    }

    /// Replaces the current match with the replacement text, writes the new
    /// buffer to the surface and rescans.
    pub fn replace_one<S>(&mut self, surface: &mut S) -> Result<ReplaceOneOutcome, SearchError>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.check_pattern()?;
        let len = self.cursor.len();
        if self.is_stale(surface) {
            warn!("replace rejected: buffer changed since last scan");
            let index = self.cursor.index().unwrap_or(0);
            let _ = self.refresh(surface);
            return Err(SearchError::IndexOutOfRange { index, len });
        }
        let index = self
            .cursor
            .index()
            .ok_or(SearchError::IndexOutOfRange { index: 0, len })?;

        let replacement = match &self.matcher {
            Some(matcher) if self.options.expand_captures => matcher.expand_match(
                &self.scanned,
                self.cursor.sequence(),
                index,
                &self.replacement,
            )?,
            _ => self.replacement.clone(),
        };
        let outcome = replace_one(&self.scanned, self.cursor.sequence(), index, &replacement)?;

        self.projector.clear(surface);
        surface.set_text(outcome.text.clone());
        self.refresh(surface)?;
        Ok(outcome)
    }

    /// Replaces every match in the surface text in a single pass and rescans.
    pub fn replace_all<S>(&mut self, surface: &mut S) -> Result<ReplaceAllOutcome, SearchError>
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.check_pattern()?;
        let outcome = replace_all(&surface.text(), &self.options, &self.replacement)
            .map_err(|err| self.record(err))?;
        if outcome.replacements > 0 {
            self.projector.clear(surface);
            surface.set_text(outcome.text.clone());
        }
        self.refresh(surface)?;
        Ok(outcome)
    }

    /// Clears the highlight and forgets matches.
    pub fn close<S>(&mut self, surface: &mut S)
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.projector.clear(surface);
        self.cursor.clear();
        self.matcher = None;
        self.scanned.clear();
        self.last_error = None;
    }

    pub fn matches(&self) -> &MatchSequence {
        self.cursor.sequence()
    }

    pub fn current(&self) -> Option<MatchSpan> {
        self.cursor.current()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor.index()
    }

    pub fn counter(&self) -> MatchCounter {
        self.cursor.counter()
    }

    /// Span currently highlighted on the surface.
    pub fn highlighted(&self) -> Option<MatchSpan> {
        self.projector.active()
    }

    pub fn last_error(&self) -> Option<&SearchError> {
        self.last_error.as_ref()
    }

    /// Replace actions are disabled while there is nothing valid to replace.
    pub fn can_replace(&self) -> bool {
        self.last_error.is_none() && !self.cursor.is_empty()
    }

    /// Whether the surface text differs from the buffer the matches came from.
    pub fn is_stale<S>(&self, surface: &S) -> bool
    where
        S: EditorSurface + ?Sized,
    {
        surface.text() != self.scanned
    }

    fn project<S>(&mut self, surface: &mut S) -> Projection
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.projector
            .project(surface, &self.scanned, self.cursor.current())
    }

    fn check_pattern(&mut self) -> Result<(), SearchError> {
        if let Err(err) = self.options.validate() {
            return Err(self.record(err));
        }
        match &self.last_error {
            Some(err @ SearchError::InvalidPattern(_)) => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn record(&mut self, err: SearchError) -> SearchError {
        if !matches!(err, SearchError::IndexOutOfRange { .. }) {
            self.last_error = Some(err.clone());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{EditorView, Selection};

    fn session_for(view: &mut EditorView, pattern: &str) -> FindReplaceSession {
        FindReplaceSession::open(view, SearchOptions::new(pattern))
    }

    #[test]
    fn open_scans_and_highlights_first_match() {
        let mut view = EditorView::new("cat sat cat");
        let session = session_for(&mut view, "cat");
        assert_eq!(session.matches().len(), 2);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.counter().to_string(), "1/2");
        assert_eq!(view.marker_range(), Some(0..3));
    }

    #[test]
    fn open_seeds_pattern_from_selection() {
        let mut view = EditorView::new("the quick fox, the lazy dog");
        view.set_selection(Some(Selection::new(0, 3)));
        let session = FindReplaceSession::open(&mut view, SearchOptions::default());
        assert_eq!(session.pattern(), "the");
        assert_eq!(session.matches().len(), 2);
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        assert_eq!(session.next(&mut view), Some(1));
        assert_eq!(view.marker_range(), Some(8..11));
        assert_eq!(session.next(&mut view), Some(0));
        assert_eq!(session.previous(&mut view), Some(1));
        assert_eq!(session.counter().to_string(), "2/2");
        assert_eq!(view.marker_count(), 1);
    }

    #[test]
    fn invalid_pattern_degrades_to_no_matches() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        let err = session.set_pattern(&mut view, "(").unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
        assert!(session.matches().is_empty());
        assert_eq!(session.counter().to_string(), "0/0");
        assert_eq!(view.marker_count(), 0);
        assert!(!session.can_replace());
        assert_eq!(session.next(&mut view), None);

        session.set_replacement("dog");
        assert!(matches!(
            session.replace_all(&mut view),
            Err(SearchError::InvalidPattern(_))
        ));
        assert_eq!(view.text(), "cat sat cat");

        session.set_pattern(&mut view, "sat").unwrap();
        assert!(session.last_error().is_none());
        assert!(session.can_replace());
    }

    #[test]
    fn replace_one_rewrites_current_match_and_reanchors() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        session.set_replacement("dog");
        session.next(&mut view);

        let outcome = session.replace_one(&mut view).unwrap();
        assert_eq!(outcome.consumed, MatchSpan::new(8, 3));
        assert_eq!(view.text(), "cat sat dog");
        assert_eq!(session.matches().len(), 1);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(view.marker_range(), Some(0..3));
    }

    #[test]
    fn replace_one_on_empty_sequence_is_out_of_range() {
        let mut view = EditorView::new("nothing");
        let mut session = session_for(&mut view, "cat");
        assert_eq!(
            session.replace_one(&mut view).unwrap_err(),
            SearchError::IndexOutOfRange { index: 0, len: 0 }
        );
        assert_eq!(view.text(), "nothing");
    }

    #[test]
    fn replace_with_empty_pattern_is_rejected() {
        let mut view = EditorView::new("text");
        let mut session = session_for(&mut view, "");
        assert_eq!(
            session.replace_all(&mut view).unwrap_err(),
            SearchError::EmptyPattern
        );
        assert_eq!(
            session.replace_one(&mut view).unwrap_err(),
            SearchError::EmptyPattern
        );
        assert_eq!(view.text(), "text");
    }

    #[test]
    fn replace_all_does_not_cascade() {
        let mut view = EditorView::new("a");
        let mut session = session_for(&mut view, "a");
        session.set_replacement("aa");
        let outcome = session.replace_all(&mut view).unwrap();
        assert_eq!(outcome.replacements, 1);
        assert_eq!(view.text(), "aa");
        assert_eq!(session.matches().len(), 1);
    }

    #[test]
    fn replace_all_deletes_and_clears_highlight() {
        let mut view = EditorView::new("foo bar foo");
        let mut session = session_for(&mut view, "foo");
        session.set_replacement("");
        session.replace_all(&mut view).unwrap();
        assert_eq!(view.text(), " bar ");
        assert_eq!(session.counter().to_string(), "0/0");
        assert_eq!(view.marker_count(), 0);
        assert!(!session.can_replace());
    }

    #[test]
    fn replace_one_expands_captures_when_enabled() {
        let mut view = EditorView::new("Doe, Jane and Roe, Rich");
        let mut options = SearchOptions::new(r"(\w+), (\w+)");
        options.expand_captures = true;
        let mut session = FindReplaceSession::open(&mut view, options);
        session.set_replacement("$2 $1");
        session.replace_one(&mut view).unwrap();
        assert_eq!(view.text(), "Jane Doe and Roe, Rich");
    }

    #[test]
    fn edits_behind_the_session_are_never_applied_with_stale_spans() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        view.set_text("a cat".into());

        assert!(session.is_stale(&view));
        assert!(matches!(
            session.replace_one(&mut view),
            Err(SearchError::IndexOutOfRange { .. })
        ));
        assert_eq!(view.text(), "a cat");
        assert!(!session.is_stale(&view));
        assert_eq!(session.current(), Some(MatchSpan::new(2, 3)));
        assert_eq!(view.marker_range(), Some(2..5));
    }

    #[test]
    fn unmounted_surface_keeps_search_working() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        assert_eq!(session.highlighted(), Some(MatchSpan::new(0, 3)));

        view.unmount();
        assert_eq!(session.next(&mut view), Some(1));
        assert_eq!(session.highlighted(), None);
        assert_eq!(session.counter().to_string(), "2/2");

        session.set_replacement("dog");
        assert_eq!(session.replacement(), "dog");
        session.replace_one(&mut view).unwrap();
        assert_eq!(view.text(), "cat sat dog");
        assert_eq!(session.highlighted(), None);

        view.mount();
        assert_eq!(session.previous(&mut view), Some(0));
        assert_eq!(view.marker_range(), Some(0..3));
    }

    #[test]
    fn set_options_rescans_with_new_flags() {
        let mut view = EditorView::new("Cat sat\ncat");
        let mut session = session_for(&mut view, "^cat");
        assert_eq!(session.matches().len(), 1);
        assert!(!session.options().multi_line);

        let mut options = session.options().clone();
        options.multi_line = true;
        assert_eq!(session.set_options(&mut view, options), Ok(2));

        let mut options = session.options().clone();
        options.case_sensitive = true;
        assert_eq!(session.set_options(&mut view, options), Ok(1));
        assert_eq!(session.current(), Some(MatchSpan::new(8, 3)));
        assert_eq!(view.marker_range(), Some(8..11));
    }

    #[test]
    fn close_removes_highlight() {
        let mut view = EditorView::new("cat sat cat");
        let mut session = session_for(&mut view, "cat");
        session.close(&mut view);
        assert_eq!(view.marker_count(), 0);
        assert!(session.matches().is_empty());
        assert_eq!(view.plain_text().as_deref(), Some("cat sat cat"));
    }
}
