//! Span and line types produced by the document parsers.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page units, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Create a bounding box from its corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Style bits attached to a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleFlags(u8);

impl StyleFlags {
    pub const NONE: StyleFlags = StyleFlags(0);
    pub const BOLD: StyleFlags = StyleFlags(1);
    pub const ITALIC: StyleFlags = StyleFlags(1 << 1);
    pub const MONOSPACE: StyleFlags = StyleFlags(1 << 2);
    pub const SUPERSCRIPT: StyleFlags = StyleFlags(1 << 3);

    /// Derive style bits from a font name such as "Helvetica-BoldOblique".
    pub fn from_font_name(font_name: &str) -> Self {
        let lower = font_name.to_lowercase();
        let mut flags = StyleFlags::NONE;
        if lower.contains("bold") || lower.contains("black") || lower.contains("heavy") {
            flags |= StyleFlags::BOLD;
        }
        if lower.contains("italic") || lower.contains("oblique") {
            flags |= StyleFlags::ITALIC;
        }
        if lower.contains("mono") || lower.contains("courier") {
            flags |= StyleFlags::MONOSPACE;
        }
        flags
    }

    pub fn contains(&self, other: StyleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_bold(&self) -> bool {
        self.contains(StyleFlags::BOLD)
    }

    pub fn is_italic(&self) -> bool {
        self.contains(StyleFlags::ITALIC)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for StyleFlags {
    type Output = StyleFlags;

    fn bitor(self, rhs: StyleFlags) -> StyleFlags {
        StyleFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StyleFlags {
    fn bitor_assign(&mut self, rhs: StyleFlags) {
        self.0 |= rhs.0;
    }
}

/// The smallest styled run of text: one font, one size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// The text content
    pub text: String,
    /// Font name without any subset prefix
    pub font: String,
    /// Font size in points
    pub size: f32,
    /// Bold/italic/... bits
    pub flags: StyleFlags,
    /// Position on the page
    pub bbox: BBox,
}

impl Span {
    /// Create a span, deriving style flags from the font name.
    pub fn new(text: impl Into<String>, font: impl Into<String>, size: f32, bbox: BBox) -> Self {
        let font = font.into();
        let flags = StyleFlags::from_font_name(&font);
        Self {
            text: text.into(),
            font,
            size,
            flags,
            bbox,
        }
    }

    /// Override the style flags.
    pub fn with_flags(mut self, flags: StyleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the span has any visible content.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Font size rounded to whole points, as used by every typography comparison.
    pub fn rounded_size(&self) -> i32 {
        self.size.round() as i32
    }
}

/// Spans sharing one visual text line, in reading order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// Raw concatenated text of the line.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Bounding box covering every span, if any.
    pub fn bbox(&self) -> Option<BBox> {
        let mut iter = self.spans.iter();
        let first = iter.next()?.bbox;
        Some(iter.fold(first, |acc, s| acc.union(&s.bbox)))
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(Span::is_blank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_from_font_name() {
        let flags = StyleFlags::from_font_name("Helvetica-BoldOblique");
        assert!(flags.is_bold());
        assert!(flags.is_italic());

        let flags = StyleFlags::from_font_name("Times-Roman");
        assert_eq!(flags, StyleFlags::NONE);

        assert!(StyleFlags::from_font_name("CourierNew").contains(StyleFlags::MONOSPACE));
    }

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(10.0, 20.0, 50.0, 30.0);
        let b = BBox::new(40.0, 15.0, 90.0, 28.0);
        let u = a.union(&b);
        assert_eq!(u, BBox::new(10.0, 15.0, 90.0, 30.0));
        assert_eq!(u.width(), 80.0);
    }

    #[test]
    fn test_rounded_size() {
        let span = Span::new("x", "Times", 11.6, BBox::default());
        assert_eq!(span.rounded_size(), 12);
        let span = Span::new("x", "Times", 9.4, BBox::default());
        assert_eq!(span.rounded_size(), 9);
    }

    #[test]
    fn test_line_bbox_and_blank() {
        let line = Line::new(vec![
            Span::new("Hello", "Times", 12.0, BBox::new(0.0, 0.0, 30.0, 12.0)),
            Span::new("  ", "Times", 12.0, BBox::new(30.0, 0.0, 34.0, 12.0)),
        ]);
        assert_eq!(line.bbox(), Some(BBox::new(0.0, 0.0, 34.0, 12.0)));
        assert!(!line.is_empty());
        assert!(Line::default().bbox().is_none());
    }
}
