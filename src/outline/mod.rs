//! Outline recovery.
//!
//! Embedded outlines (PDF bookmarks, EPUB navigation) are used when present.
//! Reflowable documents without navigation fall back to their heading
//! markup, and everything else is scanned with [`HeadingScorer`].

mod heuristic;
mod tree;

pub use heuristic::{FontStats, HeadingScorer, ACCEPT_SCORE};
pub use tree::OutlineTree;

use serde::Serialize;

use crate::error::Diagnostic;
use crate::model::{Block, Document, OutlineEntry, OutlineItem, OutlineSource};
use crate::normalize::SpanNormalizer;

/// Result of outline extraction.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineExtraction {
    /// Entries ordered by page and position
    pub entries: Vec<OutlineEntry>,
    /// Where the entries came from
    pub source: OutlineSource,
    /// Entries that had to be repaired
    pub diagnostics: Vec<Diagnostic>,
}

impl OutlineExtraction {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the tree over the extracted entries.
    pub fn tree(&self) -> OutlineTree {
        OutlineTree::build(self.entries.clone())
    }
}

/// Extract the outline of a document.
pub fn extract_outline(doc: &Document) -> OutlineExtraction {
    OutlineExtractor::new().extract(doc)
}

/// Outline extractor holding the compiled heading patterns.
pub struct OutlineExtractor {
    normalizer: SpanNormalizer,
    scorer: HeadingScorer,
}

impl OutlineExtractor {
    pub fn new() -> Self {
        Self {
            normalizer: SpanNormalizer::new(),
            scorer: HeadingScorer::new(),
        }
    }

    pub fn extract(&self, doc: &Document) -> OutlineExtraction {
        let (entries, source) = self.raw_entries(doc);
        let (entries, diagnostics) = assign_page_ranges(entries, doc.page_count());

        log::debug!(
            "Outline: {} entries from {}, {} repaired",
            entries.len(),
            source,
            diagnostics.len()
        );
        OutlineExtraction {
            entries,
            source,
            diagnostics,
        }
    }

    fn raw_entries(&self, doc: &Document) -> (Vec<OutlineEntry>, OutlineSource) {
        if let Some(outline) = doc.outline.as_ref().filter(|o| !o.is_empty()) {
            let source = if doc.layout.is_paged() {
                OutlineSource::Embedded
            } else {
                OutlineSource::Navigation
            };
            let mut entries = Vec::new();
            let mut last_page = 1;
            flatten_items(&outline.items, 1, &mut last_page, &mut entries);
            return (entries, source);
        }

        log::debug!("No embedded outline, recovering from content");
        if !doc.layout.is_paged() {
            let entries = self.markup_entries(doc);
            if !entries.is_empty() {
                return (entries, OutlineSource::Markup);
            }
        }
        (
            self.scorer.detect(doc, &self.normalizer),
            OutlineSource::Heuristic,
        )
    }

    fn markup_entries(&self, doc: &Document) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        for page in &doc.pages {
            for block in &page.blocks {
                let Some(level) = block.markup_level else {
                    continue;
                };
                let title = self.block_text(block);
                if !title.is_empty() {
                    entries.push(
                        OutlineEntry::new(level, title, page.number).with_position(block.bbox.y0),
                    );
                }
            }
        }
        entries
    }

    fn block_text(&self, block: &Block) -> String {
        block
            .lines
            .iter()
            .flat_map(|l| self.normalizer.merge_line(l))
            .map(|s| s.text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for OutlineExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten nested outline items depth-first, level = depth.
fn flatten_items(
    items: &[OutlineItem],
    depth: u8,
    last_page: &mut u32,
    out: &mut Vec<OutlineEntry>,
) {
    for item in items {
        let title = clean_title(&item.title);
        let page = item.page.unwrap_or(*last_page);
        *last_page = page;
        if !title.is_empty() {
            out.push(OutlineEntry::new(depth, title, page));
        }
        flatten_items(&item.children, depth.saturating_add(1), last_page, out);
    }
}

/// Strip carriage returns, soft hyphens and odd spacing from a bookmark title.
fn clean_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|&c| c != '\r' && c != '\u{00AD}')
        .map(|c| match c {
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\n' | '\t' => ' ',
            other => other,
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive every `end_page` and clamp impossible ranges.
///
/// The end page of an entry is the start page of the next entry at the same
/// or a shallower level, or the last page of the document.
pub fn assign_page_ranges(
    mut entries: Vec<OutlineEntry>,
    page_count: u32,
) -> (Vec<OutlineEntry>, Vec<Diagnostic>) {
    let last = page_count.max(1);
    let mut diagnostics = Vec::new();

    for i in 0..entries.len() {
        let level = entries[i].level;
        let start = entries[i].start_page;
        let end = entries[i + 1..]
            .iter()
            .find(|e| e.level <= level)
            .map(|e| e.start_page)
            .unwrap_or(last);

        let fixed_start = start.clamp(1, last);
        let fixed_end = end.clamp(fixed_start, last);
        if fixed_start != start || end < start {
            log::warn!(
                "Outline entry {:?} has pages {}..{}, clamping",
                entries[i].title,
                start,
                end
            );
            diagnostics.push(Diagnostic::MalformedOutlineEntry {
                title: entries[i].title.clone(),
                start_page: start,
                end_page: end,
            });
        }

        let entry = &mut entries[i];
        entry.start_page = fixed_start;
        entry.end_page = fixed_end;
    }

    (entries, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Layout, Line, Outline, Page, Span};

    fn doc_with_pages(layout: Layout, pages: u32) -> Document {
        let mut doc = Document::new(layout);
        for n in 1..=pages {
            doc.add_page(Page::letter(n));
        }
        doc
    }

    #[test]
    fn test_end_pages_follow_next_shallower_entry() {
        let entries = vec![
            OutlineEntry::new(1, "One", 1),
            OutlineEntry::new(2, "One.A", 2),
            OutlineEntry::new(2, "One.B", 4),
            OutlineEntry::new(1, "Two", 6),
        ];
        let (entries, diagnostics) = assign_page_ranges(entries, 10);
        assert!(diagnostics.is_empty());
        let ranges: Vec<_> = entries.iter().map(|e| (e.start_page, e.end_page)).collect();
        assert_eq!(ranges, vec![(1, 6), (2, 4), (4, 6), (6, 10)]);
    }

    #[test]
    fn test_malformed_ranges_are_clamped() {
        let entries = vec![
            OutlineEntry::new(1, "Late", 8),
            OutlineEntry::new(1, "Early", 3),
            OutlineEntry::new(1, "Beyond", 40),
        ];
        let (entries, diagnostics) = assign_page_ranges(entries, 10);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!((entries[0].start_page, entries[0].end_page), (8, 8));
        assert_eq!((entries[2].start_page, entries[2].end_page), (10, 10));
        for entry in &entries {
            assert!(entry.start_page <= entry.end_page);
        }
    }

    #[test]
    fn test_embedded_outline_flattened() {
        let mut doc = doc_with_pages(Layout::Paged, 12);
        let mut outline = Outline::new();
        outline.add_item(
            OutlineItem::new("Chapter\r 1\u{00A0}Basics", Some(1))
                .with_child(OutlineItem::new("Setup", None))
                .with_child(OutlineItem::new("Us\u{00AD}age", Some(5))),
        );
        outline.add_item(OutlineItem::new("Chapter 2", Some(9)));
        doc.outline = Some(outline);

        let extraction = extract_outline(&doc);
        assert_eq!(extraction.source, OutlineSource::Embedded);
        let summary: Vec<_> = extraction
            .entries
            .iter()
            .map(|e| (e.level, e.title.as_str(), e.start_page, e.end_page))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "Chapter 1 Basics", 1, 9),
                (2, "Setup", 1, 5),
                (2, "Usage", 5, 9),
                (1, "Chapter 2", 9, 12),
            ]
        );
    }

    #[test]
    fn test_reflowable_markup_headings() {
        let mut doc = doc_with_pages(Layout::Reflowable, 2);
        let heading = |text: &str, level: u8| {
            Block::text(vec![Line::new(vec![Span::new(
                text,
                "serif-bold",
                20.0,
                BBox::new(0.0, 0.0, 100.0, 20.0),
            )])])
            .with_markup_level(level)
        };
        doc.pages[0].add_block(heading("Prologue", 1));
        doc.pages[1].add_block(heading("The Storm", 2));

        let extraction = extract_outline(&doc);
        assert_eq!(extraction.source, OutlineSource::Markup);
        assert_eq!(extraction.entries.len(), 2);
        assert_eq!(extraction.entries[1].title, "The Storm");
        assert_eq!(extraction.entries[1].level, 2);
        assert_eq!(extraction.entries[0].end_page, 2);
    }

    #[test]
    fn test_heuristic_fallback() {
        let mut doc = doc_with_pages(Layout::Paged, 1);
        let line = |text: &str, font: &str, size: f32, y: f32| {
            Line::new(vec![Span::new(text, font, size, BBox::new(72.0, y, 300.0, y + size))])
        };
        let mut lines = vec![line("1. Introduction", "Times-Bold", 16.0, 100.0)];
        for i in 0..6 {
            lines.push(line("plain body text here", "Times", 10.0, 130.0 + i as f32 * 12.0));
        }
        doc.pages[0].add_block(Block::text(lines));

        let extraction = extract_outline(&doc);
        assert_eq!(extraction.source, OutlineSource::Heuristic);
        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].title, "1. Introduction");
        assert_eq!(extraction.entries[0].level, 1);
    }

    #[test]
    fn test_empty_document() {
        let extraction = extract_outline(&Document::default());
        assert!(extraction.is_empty());
        assert!(extraction.tree().is_empty());
    }
}
