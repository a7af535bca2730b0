//! Projects the active match onto the editor's presentation layer.
//!
//! Highlighting is best-effort: a detached surface, a surface whose rendered
//! text no longer equals the scanned buffer, or a span that does not fit all
//! leave the surface unmarked instead of failing.

use scribe_search::MatchSpan;
use tracing::{debug, warn};

use crate::surface::{EditorSurface, HighlightLayer, Selection};

/// Visible effect of one [`HighlightProjector::project`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Any previous marker was removed and nothing new was marked.
    Cleared,
    Marked(MatchSpan),
    /// The surface could not be marked; it carries no marker afterwards.
    Skipped,
}

#[derive(Debug, Default, Clone)]
pub struct HighlightProjector {
    active: Option<MatchSpan>,
}

impl HighlightProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Span currently marked on the surface, if any.
    pub fn active(&self) -> Option<MatchSpan> {
        self.active
    }

    /// Marks `span` on `surface`, removing any previous marker first.
    ///
    /// `buffer` is the text the span was derived from; the span is only applied
    /// when the surface still renders exactly that text.
    pub fn project<S>(&mut self, surface: &mut S, buffer: &str, span: Option<MatchSpan>) -> Projection
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.active = None;
        if !surface.is_mounted() {
            debug!("highlight skipped: surface is not mounted");
            return Projection::Skipped;
        }
        surface.remove_marker();

        let Some(span) = span else {
            return Projection::Cleared;
        };
        if surface.plain_text().as_deref() != Some(buffer) {
            warn!("highlight skipped: surface text differs from the scanned buffer");
            return Projection::Skipped;
        }
        if !span.fits(buffer) || !surface.wrap_marker(span.range()) {
            debug!(start = span.start, len = span.len, "highlight skipped: span does not fit");
            return Projection::Skipped;
        }

        surface.scroll_into_view(span.range());
        surface.set_selection(Some(Selection::from(span)));
        self.active = Some(span);
        Projection::Marked(span)
    }

    /// Removes the marker, leaving the selection untouched.
    pub fn clear<S>(&mut self, surface: &mut S) -> Projection
    where
        S: EditorSurface + HighlightLayer + ?Sized,
    {
        self.active = None;
        if !surface.is_mounted() {
            return Projection::Skipped;
        }
        surface.remove_marker();
        Projection::Cleared
    }
}
