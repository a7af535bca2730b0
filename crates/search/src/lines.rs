/// Maps byte offsets to 1-based line/column positions.
#[derive(Clone, Debug)]
pub struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { text, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Zero-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert) => insert.saturating_sub(1),
        }
    }

    /// 1-based `(line, column)`; the column counts chars.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let line_start = self.starts[line];
        let column = self
            .text
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        (line + 1, column + 1)
    }

    /// Byte offset where the zero-based `line` begins.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line).copied()
    }

    /// Text of the 1-based `line` without its terminator.
    pub fn line_text(&self, line: usize) -> &'a str {
        let zero_based = line.saturating_sub(1);
        let Some(start) = self.line_start(zero_based) else {
            return "";
        };
        let end = self.line_start(zero_based + 1).unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches(|c| c == '\n' || c == '\r')
    }
}
