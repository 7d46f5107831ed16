//! Page-level types.

use serde::{Deserialize, Serialize};

use super::{BBox, Line};

/// Kind of layout block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Lines of text
    #[default]
    Text,
    /// An image or figure
    Image,
}

/// A layout unit (paragraph, heading, figure) on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Text or image
    pub kind: BlockKind,

    /// Position on the page
    pub bbox: BBox,

    /// Lines in reading order (empty for images)
    pub lines: Vec<Line>,

    /// Heading level from document markup (`h1`..`h6`), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_level: Option<u8>,
}

impl Block {
    /// Create a text block; its bbox covers all lines.
    pub fn text(lines: Vec<Line>) -> Self {
        let bbox = lines
            .iter()
            .filter_map(Line::bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Self {
            kind: BlockKind::Text,
            bbox,
            lines,
            markup_level: None,
        }
    }

    /// Create an image block.
    pub fn image(bbox: BBox) -> Self {
        Self {
            kind: BlockKind::Image,
            bbox,
            lines: Vec::new(),
            markup_level: None,
        }
    }

    /// Tag the block with a markup heading level.
    pub fn with_markup_level(mut self, level: u8) -> Self {
        self.markup_level = Some(level.clamp(1, 6));
        self
    }

    pub fn is_image(&self) -> bool {
        self.kind == BlockKind::Image
    }

    /// Raw text of the block, lines joined by spaces.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single page in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Blocks in reading order
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// Create a new page with standard Letter size (8.5 x 11 inches).
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| !b.is_image())
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the page has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    #[test]
    fn test_text_block_bbox() {
        let block = Block::text(vec![
            Line::new(vec![Span::new(
                "Title",
                "Times",
                18.0,
                BBox::new(72.0, 100.0, 140.0, 118.0),
            )]),
            Line::new(vec![Span::new(
                "Body",
                "Times",
                12.0,
                BBox::new(72.0, 124.0, 110.0, 136.0),
            )]),
        ]);
        assert_eq!(block.bbox, BBox::new(72.0, 100.0, 140.0, 136.0));
        assert_eq!(block.plain_text(), "Title Body");
    }

    #[test]
    fn test_page_plain_text_skips_images() {
        let mut page = Page::letter(1);
        page.add_block(Block::image(BBox::new(0.0, 0.0, 10.0, 10.0)));
        page.add_block(Block::text(vec![Line::new(vec![Span::new(
            "Hello",
            "Times",
            12.0,
            BBox::default(),
        )])]));
        assert_eq!(page.plain_text(), "Hello");
    }

    #[test]
    fn test_markup_level_clamped() {
        let block = Block::text(Vec::new()).with_markup_level(9);
        assert_eq!(block.markup_level, Some(6));
    }
}
