pub mod document;
pub mod highlight;
pub mod session;
pub mod surface;

pub use document::{Document, DocumentError, Encoding, LineEnding};
pub use highlight::{HighlightProjector, Projection};
pub use session::FindReplaceSession;
pub use surface::{EditorSurface, EditorView, HighlightLayer, Segment, Selection, Viewport};
