//! Document model types.
//!
//! Parsers turn PDF and EPUB files into this representation: pages of
//! blocks, blocks of lines, lines of styled spans. Outline recovery and
//! segmentation only ever look at this model, never at the source format.

mod document;
mod outline;
mod page;
mod section;
mod span;

pub use document::{Document, Layout, Metadata, Outline, OutlineItem};
pub use outline::{EntryId, OutlineEntry, OutlineSource};
pub use page::{Block, BlockKind, Page};
pub use section::{SectionText, SectionValue, OWN_TEXT_KEY};
pub use span::{BBox, Line, Span, StyleFlags};
