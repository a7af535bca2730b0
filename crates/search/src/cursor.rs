use std::fmt;

use crate::{MatchSequence, MatchSpan};

/// Navigation direction for `Find Next` / `Find Previous`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Moves `index` one step around a ring of `len` matches.
///
/// Returns `None` when the ring is empty.
pub fn step(index: usize, direction: Direction, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = index % len;
    Some(match direction {
        Direction::Next => (index + 1) % len,
        Direction::Previous => (index + len - 1) % len,
    })
}

/// Current match position within a [`MatchSequence`].
///
/// The index is `Some` exactly when the sequence is non-empty. A new sequence
/// always re-anchors the cursor to the first match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchCursor {
    sequence: MatchSequence,
    index: Option<usize>,
}

impl MatchCursor {
    pub fn new(sequence: MatchSequence) -> Self {
        let mut cursor = Self::default();
        cursor.reset(sequence);
        cursor
    }

    /// Replaces the sequence and points at its first match (or nothing).
    pub fn reset(&mut self, sequence: MatchSequence) {
        self.index = if sequence.is_empty() { None } else { Some(0) };
        self.sequence = sequence;
    }

    pub fn clear(&mut self) {
        self.reset(MatchSequence::empty());
    }

    /// Steps the cursor and returns the new index; a no-op on an empty sequence.
    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let next = step(self.index?, direction, self.sequence.len())?;
        self.index = Some(next);
        Some(next)
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<MatchSpan> {
        self.index.and_then(|idx| self.sequence.get(idx))
    }

    pub fn sequence(&self) -> &MatchSequence {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn counter(&self) -> MatchCounter {
        MatchCounter {
            position: self.index,
            total: self.sequence.len(),
        }
    }
}

/// `"<index+1>/<count>"` label shown next to the search field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchCounter {
    pub position: Option<usize>,
    pub total: usize,
}

impl fmt::Display for MatchCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(idx) if self.total > 0 => write!(f, "{}/{}", idx + 1, self.total),
            _ => f.write_str("0/0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{find_all, SearchOptions};

    fn cursor_for(text: &str, pattern: &str) -> MatchCursor {
        MatchCursor::new(find_all(text, &SearchOptions::new(pattern)).unwrap())
    }

    #[test]
    fn next_wraps_to_first_match() {
        let mut cursor = cursor_for("cat sat cat", "cat");
        assert_eq!(cursor.index(), Some(0));
        assert_eq!(cursor.advance(Direction::Next), Some(1));
        assert_eq!(cursor.current().map(|s| s.start), Some(8));
        assert_eq!(cursor.advance(Direction::Next), Some(0));
    }

    #[test]
    fn previous_wraps_to_last_match() {
        let mut cursor = cursor_for("a b a b a", "a");
        assert_eq!(cursor.advance(Direction::Previous), Some(2));
        assert_eq!(cursor.advance(Direction::Previous), Some(1));
    }

    #[test]
    fn full_cycle_returns_to_start() {
        for n in 1..6usize {
            for start in 0..n {
                for direction in [Direction::Next, Direction::Previous] {
                    let mut index = start;
                    for _ in 0..n {
                        index = step(index, direction, n).unwrap();
                    }
                    assert_eq!(index, start);
                }
            }
        }
    }

    #[test]
    fn empty_sequence_is_inert() {
        let mut cursor = cursor_for("nothing here", "cat");
        assert_eq!(cursor.index(), None);
        assert_eq!(cursor.advance(Direction::Next), None);
        assert_eq!(cursor.advance(Direction::Previous), None);
        assert_eq!(cursor.counter().to_string(), "0/0");
        assert_eq!(step(3, Direction::Next, 0), None);
    }

    #[test]
    fn reset_reanchors_to_first_match() {
        let mut cursor = cursor_for("x x x", "x");
        cursor.advance(Direction::Next);
        cursor.advance(Direction::Next);
        assert_eq!(cursor.counter().to_string(), "3/3");
        cursor.reset(find_all("x x", &SearchOptions::new("x")).unwrap());
        assert_eq!(cursor.index(), Some(0));
        assert_eq!(cursor.counter().to_string(), "1/2");
        cursor.clear();
        assert_eq!(cursor.index(), None);
    }
}
