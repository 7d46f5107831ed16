//! Flat outline entries.

use serde::{Deserialize, Serialize};

/// Identity of an entry: its index in the flat outline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub usize);

impl EntryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One heading with its level and page range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// Hierarchical level, 1 = highest
    pub level: u8,
    /// Heading text
    pub title: String,
    /// First page of the section (1-indexed)
    pub start_page: u32,
    /// Start page of the next entry at the same or a shallower level,
    /// or the last page of the document
    pub end_page: u32,
    /// Vertical position of the heading on its start page
    #[serde(default)]
    pub position: f32,
}

impl OutlineEntry {
    /// Create an entry whose `end_page` is not yet known.
    pub fn new(level: u8, title: impl Into<String>, start_page: u32) -> Self {
        Self {
            level,
            title: title.into(),
            start_page,
            end_page: start_page,
            position: 0.0,
        }
    }

    /// Create an entry with an explicit page range.
    pub fn with_range(level: u8, title: impl Into<String>, start_page: u32, end_page: u32) -> Self {
        Self {
            end_page,
            ..Self::new(level, title, start_page)
        }
    }

    pub fn with_position(mut self, position: f32) -> Self {
        self.position = position;
        self
    }

    /// Inclusive page range covered by the entry.
    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start_page..=self.end_page
    }
}

/// Where an outline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineSource {
    /// PDF bookmarks
    Embedded,
    /// EPUB nav document or NCX
    Navigation,
    /// `h1`..`h6` markup in reflowable content
    Markup,
    /// Scored from font and text heuristics
    Heuristic,
}

impl std::fmt::Display for OutlineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutlineSource::Embedded => "embedded bookmarks",
            OutlineSource::Navigation => "navigation document",
            OutlineSource::Markup => "heading markup",
            OutlineSource::Heuristic => "heuristic scan",
        };
        f.write_str(name)
    }
}
