use std::ops::Range;

use scribe_search::{LineIndex, MatchSpan};

/// 定義一段已排序（start <= end）的文字範圍。 / Ordered byte range within the editor text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    start: usize,
    end: usize,
}

impl Selection {
    /// 建立選取範圍，會自動將 start/end 排序。 / Creates a selection with ordered bounds.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    fn clamp(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

impl From<MatchSpan> for Selection {
    fn from(span: MatchSpan) -> Self {
        Self::new(span.start, span.end())
    }
}

/// 宿主編輯器的文字與選取介面。 / Text and selection contract of the host editor.
pub trait EditorSurface {
    /// 取得目前文字。 / Returns the current text.
    fn text(&self) -> String;

    /// 整體取代文字。 / Replaces the text wholesale.
    fn set_text(&mut self, text: String);

    fn selection(&self) -> Option<Selection>;

    fn set_selection(&mut self, selection: Option<Selection>);

    /// 目前選取的文字（空選取視為無）。 / Text under the current selection, if non-empty.
    fn selected_text(&self) -> Option<String> {
        let selection = self.selection()?;
        if selection.is_empty() {
            return None;
        }
        self.text().get(selection.range()).map(str::to_owned)
    }
}

/// 呈現層：只負責標記，不改變文字內容。 / Presentation layer that marks text without editing it.
pub trait HighlightLayer {
    /// 呈現層是否已掛載。 / Whether the rendered surface exists.
    fn is_mounted(&self) -> bool;

    /// 呈現層的純文字（忽略標記）；未掛載時為 `None`。 / Rendered plain text ignoring markers.
    fn plain_text(&self) -> Option<String>;

    /// 以標記包住指定範圍；失敗時回傳 `false`。 / Wraps `range` in a marker, returning `false` on failure.
    fn wrap_marker(&mut self, range: Range<usize>) -> bool;

    /// 移除既有標記並還原文字節點。 / Removes the marker, restoring plain text runs.
    fn remove_marker(&mut self) -> bool;

    fn scroll_into_view(&mut self, range: Range<usize>);
}

/// 呈現層中的一段文字。 / One rendered run of text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Marker(String),
}

impl Segment {
    fn as_str(&self) -> &str {
        match self {
            Segment::Text(text) | Segment::Marker(text) => text,
        }
    }
}

/// 可見行範圍。 / Visible line window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    /// 第一個可見行（從 0 起算）。 / First visible line, zero-based.
    pub top_line: usize,
    pub height: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_line: 0,
            height: 20,
        }
    }
}

/// 記憶體內的編輯畫面：文字內容加上可拆分的呈現段落。 / In-memory editor view: text content plus split-able rendered runs.
#[derive(Clone, Debug, Default)]
pub struct EditorView {
    text: String,
    rendered: Option<Vec<Segment>>,
    selection: Option<Selection>,
    viewport: Viewport,
}

impl EditorView {
    /// 建立已掛載的畫面。 / Creates a mounted view.
    pub fn new(text: impl Into<String>) -> Self {
        let mut view = Self::detached(text);
        view.mount();
        view
    }

    /// 建立尚未掛載呈現層的畫面。 / Creates a view without a rendered surface.
    pub fn detached(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_viewport_height(mut self, height: usize) -> Self {
        self.viewport.height = height.max(1);
        self
    }

    /// 依目前文字重新建立呈現層。 / Renders the current text afresh.
    pub fn mount(&mut self) {
        self.rendered = Some(plain_runs(&self.text));
    }

    pub fn unmount(&mut self) {
        self.rendered = None;
    }

    pub fn segments(&self) -> &[Segment] {
        self.rendered.as_deref().unwrap_or(&[])
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// 標記所在範圍。 / Byte range currently wrapped by the marker.
    pub fn marker_range(&self) -> Option<Range<usize>> {
        let mut offset = 0;
        for segment in self.segments() {
            let len = segment.as_str().len();
            if matches!(segment, Segment::Marker(_)) {
                return Some(offset..offset + len);
            }
            offset += len;
        }
        None
    }

    pub fn marker_count(&self) -> usize {
        self.segments()
            .iter()
            .filter(|segment| matches!(segment, Segment::Marker(_)))
            .count()
    }

    /// 以指定符號包住標記輸出呈現內容。 / Renders the surface with the marker delimited by `open`/`close`.
    pub fn render_with(&self, open: &str, close: &str) -> String {
        let Some(segments) = &self.rendered else {
            return self.text.clone();
        };
        let mut out = String::with_capacity(self.text.len() + open.len() + close.len());
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Marker(text) => {
                    out.push_str(open);
                    out.push_str(text);
                    out.push_str(close);
                }
            }
        }
        out
    }

    /// 只輸出可見行。 / Renders only the lines inside the viewport.
    pub fn render_viewport(&self, open: &str, close: &str) -> Vec<String> {
        self.render_with(open, close)
            .split('\n')
            .skip(self.viewport.top_line)
            .take(self.viewport.height)
            .map(str::to_owned)
            .collect()
    }
}

impl EditorSurface for EditorView {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
        if self.rendered.is_some() {
            self.mount();
        }
        self.selection = self.selection.map(|sel| sel.clamp(self.text.len()));
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection.map(|sel| sel.clamp(self.text.len()));
    }
}

impl HighlightLayer for EditorView {
    fn is_mounted(&self) -> bool {
        self.rendered.is_some()
    }

    fn plain_text(&self) -> Option<String> {
        let segments = self.rendered.as_ref()?;
        Some(segments.iter().map(Segment::as_str).collect())
    }

    fn wrap_marker(&mut self, range: Range<usize>) -> bool {
        if range.is_empty() || self.marker_count() > 0 {
            return false;
        }
        let Some(segments) = self.rendered.as_mut() else {
            return false;
        };

        let mut offset = 0;
        for idx in 0..segments.len() {
            let len = segments[idx].as_str().len();
            let seg_end = offset + len;
            if range.start >= offset && range.end <= seg_end {
                let Segment::Text(text) = &segments[idx] else {
                    return false;
                };
                let local = (range.start - offset)..(range.end - offset);
                let (Some(before), Some(marked), Some(after)) = (
                    text.get(..local.start),
                    text.get(local.clone()),
                    text.get(local.end..),
                ) else {
                    return false;
                };
                let mut replacement = Vec::with_capacity(3);
                if !before.is_empty() {
                    replacement.push(Segment::Text(before.to_owned()));
                }
                replacement.push(Segment::Marker(marked.to_owned()));
                if !after.is_empty() {
                    replacement.push(Segment::Text(after.to_owned()));
                }
                segments.splice(idx..=idx, replacement);
                return true;
            }
            offset = seg_end;
        }
        false
    }

    fn remove_marker(&mut self) -> bool {
        let Some(segments) = self.rendered.as_mut() else {
            return false;
        };
        if !segments.iter().any(|s| matches!(s, Segment::Marker(_))) {
            return false;
        }
        // 合併相鄰文字段，避免殘留節點。 / Merge adjacent runs so no residual nodes remain.
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for segment in segments.drain(..) {
            let text = match segment {
                Segment::Text(text) | Segment::Marker(text) => text,
            };
            if text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(Segment::Text(prev)) => prev.push_str(&text),
                _ => merged.push(Segment::Text(text)),
            }
        }
        *segments = merged;
        true
    }

    fn scroll_into_view(&mut self, range: Range<usize>) {
        let line = LineIndex::new(&self.text).line_of(range.start.min(self.text.len()));
        let height = self.viewport.height.max(1);
        if line < self.viewport.top_line {
            self.viewport.top_line = line;
        } else if line >= self.viewport.top_line + height {
            self.viewport.top_line = line + 1 - height;
        }
    }
}

fn plain_runs(text: &str) -> Vec<Segment> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Segment::Text(text.to_owned())]
    }
}
