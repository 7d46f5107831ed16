//! # sectify
//!
//! Outline recovery and section segmentation for PDF and EPUB documents.
//!
//! This library reads a document's table of contents (or reconstructs one
//! from typography when there is none) and splits the body text into
//! sections keyed by heading title.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sectify::{render, Sectify};
//!
//! fn main() -> sectify::Result<()> {
//!     // Parse the document and recover its outline
//!     let result = Sectify::new().open("paper.pdf")?;
//!
//!     // Pick a section and extract its text
//!     let methods = result.select_by_title("Methods").unwrap();
//!     let extracted = result.extract(&[methods]);
//!
//!     let json = render::to_json(&extracted.sections, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Embedded outlines**: PDF bookmarks, EPUB navigation documents and NCX
//! - **Heuristic outlines**: heading detection from font size, weight and numbering
//! - **Nested sections**: subsections are segmented under their parent
//! - **Parallel layout**: Uses Rayon for multi-page PDFs
//! - **Renderers**: JSON, Markdown, plain text and flashcard decks

pub mod detect;
pub mod error;
pub mod model;
pub mod normalize;
pub mod outline;
pub mod parser;
pub mod render;
pub mod segment;
pub mod typography;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_supported, DocumentFormat};
pub use error::{Diagnostic, Error, Result};
pub use model::{
    BBox, Block, Document, EntryId, Layout, Line, Metadata, Outline, OutlineEntry, OutlineItem,
    OutlineSource, Page, SectionText, SectionValue, Span, StyleFlags,
};
pub use outline::{extract_outline, OutlineExtraction, OutlineExtractor, OutlineTree};
pub use parser::{DocumentParser, EpubParser, ErrorMode, ParseOptions, PdfParser};
pub use render::{JsonFormat, RenderOptions};
pub use segment::{Cursor, SegmentOptions, Segmentation, Segmenter};
pub use typography::TypographyBaseline;

use std::path::Path;

/// Parse a PDF or EPUB file into the document model.
///
/// The format is detected from the file content.
///
/// # Arguments
///
/// * `path` - Path to the document
///
/// # Example
///
/// ```no_run
/// use sectify::open_document;
///
/// let doc = open_document("book.epub").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn open_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    open_document_with_options(path, ParseOptions::default())
}

/// Parse a PDF or EPUB file with custom options.
///
/// # Example
///
/// ```no_run
/// use sectify::{open_document_with_options, ParseOptions};
///
/// let options = ParseOptions::new().lenient().sequential();
/// let doc = open_document_with_options("paper.pdf", options).unwrap();
/// ```
pub fn open_document_with_options<P: AsRef<Path>>(
    path: P,
    options: ParseOptions,
) -> Result<Document> {
    parser::open_parser(path, options)?.parse()
}

/// Parse a PDF or EPUB held in memory.
///
/// # Arguments
///
/// * `data` - File content as bytes
pub fn parse_bytes(data: &[u8]) -> Result<Document> {
    parser::parse_bytes(data, ParseOptions::default())
}

/// Builder for parsing a document and segmenting it.
///
/// # Example
///
/// ```no_run
/// use sectify::Sectify;
///
/// let result = Sectify::new()
///     .lenient()
///     .with_images(false)
///     .with_margin(40.0)
///     .open("paper.pdf")?;
/// let sections = result.extract_all();
/// # Ok::<(), sectify::Error>(())
/// ```
pub struct Sectify {
    parse_options: ParseOptions,
    segment_options: SegmentOptions,
}

impl Sectify {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::default(),
            segment_options: SegmentOptions::default(),
        }
    }

    /// Enable lenient parsing mode.
    pub fn lenient(mut self) -> Self {
        self.parse_options = self.parse_options.lenient();
        self
    }

    /// Disable parallel page layout.
    pub fn sequential(mut self) -> Self {
        self.parse_options = self.parse_options.sequential();
        self
    }

    /// Enable image placement detection.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.parse_options = self.parse_options.with_images(extract);
        self
    }

    /// Set the header and footer band height.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.segment_options = self.segment_options.with_margin(margin);
        self
    }

    /// Set how many leading lines of a block may hold a heading.
    pub fn with_heading_line_limit(mut self, limit: usize) -> Self {
        self.segment_options = self.segment_options.with_heading_line_limit(limit);
        self
    }

    pub fn with_segment_options(mut self, options: SegmentOptions) -> Self {
        self.segment_options = options;
        self
    }

    /// Parse a document file and recover its outline.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<SectifyResult> {
        let document = parser::open_parser(path, self.parse_options.clone())?.parse()?;
        Ok(self.from_document(document))
    }

    /// Parse a document from bytes and recover its outline.
    pub fn parse_bytes(self, data: &[u8]) -> Result<SectifyResult> {
        let document = parser::parse_bytes(data, self.parse_options.clone())?;
        Ok(self.from_document(document))
    }

    /// Recover the outline of an already parsed document.
    pub fn from_document(self, document: Document) -> SectifyResult {
        let baseline = TypographyBaseline::estimate(&document);
        let outline = extract_outline(&document);
        let tree = outline.tree();
        log::debug!(
            "Baseline {} {}pt, {} outline entries",
            baseline.main_font,
            baseline.main_size,
            tree.len()
        );
        SectifyResult {
            document,
            baseline,
            outline,
            tree,
            segment_options: self.segment_options,
        }
    }
}

impl Default for Sectify {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed document with its recovered outline.
pub struct SectifyResult {
    /// The parsed document
    pub document: Document,
    /// Dominant body font and size
    pub baseline: TypographyBaseline,
    /// Recovered outline entries and their source
    pub outline: OutlineExtraction,
    tree: OutlineTree,
    segment_options: SegmentOptions,
}

impl SectifyResult {
    pub fn metadata(&self) -> &Metadata {
        &self.document.metadata
    }

    /// Outline entries in document order.
    pub fn entries(&self) -> &[OutlineEntry] {
        &self.outline.entries
    }

    pub fn tree(&self) -> &OutlineTree {
        &self.tree
    }

    /// A segmenter over this document.
    pub fn segmenter(&self) -> Segmenter<'_> {
        Segmenter::new(&self.document, &self.baseline, &self.tree)
            .with_options(self.segment_options.clone())
    }

    /// Entry by title: an exact match ignoring case first, then the first
    /// entry whose title matches loosely.
    pub fn select_by_title(&self, title: &str) -> Option<EntryId> {
        self.tree.find_by_title(title).or_else(|| {
            self.entries()
                .iter()
                .position(|e| segment::titles_match(title, &e.title))
                .map(EntryId)
        })
    }

    /// Entry by its 1-based position in the outline listing.
    pub fn select_by_index(&self, index: usize) -> Option<EntryId> {
        if index == 0 || index > self.tree.len() {
            return None;
        }
        Some(EntryId(index - 1))
    }

    /// The top-level entries.
    pub fn top_level(&self) -> Vec<EntryId> {
        self.tree.roots().to_vec()
    }

    /// Extract the text of the given entries.
    pub fn extract(&self, targets: &[EntryId]) -> Segmentation {
        self.segmenter().extract(targets)
    }

    /// Extract every top-level section with its subsections.
    ///
    /// A document without any outline comes back as a single section
    /// holding all of its body text, titled after the document.
    pub fn extract_all(&self) -> Segmentation {
        if self.tree.is_empty() {
            log::warn!("No outline found, returning the whole document as one section");
            let title = self
                .metadata()
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Document".to_string());
            let mut sections = SectionText::new();
            sections.insert(title, SectionValue::Text(self.segmenter().whole_text()));
            return Segmentation {
                sections,
                diagnostics: Vec::new(),
            };
        }
        self.extract(&self.top_level())
    }

    /// Outline repairs followed by the problems met during `segmentation`.
    pub fn diagnostics(&self, segmentation: &Segmentation) -> Vec<Diagnostic> {
        self.outline
            .diagnostics
            .iter()
            .chain(&segmentation.diagnostics)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading_doc() -> Document {
        let mut doc = Document::new(Layout::Paged);
        let mut page = Page::letter(1);
        let mut y = 100.0;
        for (text, font, size) in [
            ("Introduction", "Times-Bold", 16.0),
            ("Some opening words for the paper.", "Times", 10.0),
            ("More words follow in the body.", "Times", 10.0),
            ("Results", "Times-Bold", 16.0),
            ("The numbers are in.", "Times", 10.0),
            ("And they look good.", "Times", 10.0),
        ] {
            let span = Span::new(text, font, size, BBox::new(72.0, y, 500.0, y + size));
            page.add_block(Block::text(vec![Line::new(vec![span])]));
            y += 40.0;
        }
        doc.add_page(page);
        doc.outline = Some(Outline {
            items: vec![
                OutlineItem::new("Introduction", Some(1)),
                OutlineItem::new("Results", Some(1)),
            ],
        });
        doc
    }

    #[test]
    fn test_sectify_builder() {
        let builder = Sectify::new().lenient().sequential().with_margin(30.0);
        assert!(matches!(builder.parse_options.error_mode, ErrorMode::Lenient));
        assert!(!builder.parse_options.parallel);
        assert_eq!(builder.segment_options.margin, 30.0);
    }

    #[test]
    fn test_sectify_builder_default() {
        let builder = Sectify::default();
        assert!(builder.parse_options.parallel);
        assert_eq!(builder.segment_options, SegmentOptions::default());
    }

    #[test]
    fn test_parse_bytes_unknown_format() {
        assert!(parse_bytes(b"not a document").is_err());
        assert!(Sectify::new().parse_bytes(&[]).is_err());
    }

    #[test]
    fn test_select_entries() {
        let result = Sectify::new().from_document(heading_doc());
        assert_eq!(result.outline.source, OutlineSource::Embedded);
        assert_eq!(result.select_by_title("results"), Some(EntryId(1)));
        assert_eq!(result.select_by_index(1), Some(EntryId(0)));
        assert_eq!(result.select_by_index(0), None);
        assert_eq!(result.select_by_index(3), None);
        assert_eq!(result.select_by_title("Appendix"), None);
    }

    #[test]
    fn test_extract_all() {
        let result = Sectify::new().from_document(heading_doc());
        let extracted = result.extract_all();
        assert_eq!(
            extracted.sections.get("Introduction").unwrap().text(),
            "Some opening words for the paper. More words follow in the body."
        );
        assert_eq!(
            extracted.sections.get("Results").unwrap().text(),
            "The numbers are in. And they look good."
        );
    }

    #[test]
    fn test_extract_all_without_outline() {
        let mut doc = Document::new(Layout::Paged);
        let mut page = Page::letter(1);
        let span = Span::new("Just body text.", "Times", 10.0, BBox::new(72.0, 100.0, 500.0, 110.0));
        page.add_block(Block::text(vec![Line::new(vec![span])]));
        doc.add_page(page);

        let result = Sectify::new().from_document(doc);
        assert!(result.tree().is_empty());
        let extracted = result.extract_all();
        assert_eq!(extracted.sections.get("Document").unwrap().text(), "Just body text.");
    }
}
