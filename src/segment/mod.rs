//! Section text segmentation.
//!
//! For each requested outline entry the segmenter walks the blocks of its
//! page range, finds the heading, and collects body text until the next
//! sibling heading. When the first child heading shows up, the children are
//! segmented recursively and nested under the parent.
//!
//! Each section is scanned by a small state machine:
//!
//! ```text
//! Seeking --title--> InBody --first child--> InSubsection
//!    |                  |                         |
//!    |             next/refs                    next
//!    |                  v                         |
//!    +--next/refs--> (abandon)     Done <---------+
//! ```

mod matcher;

pub use matcher::{is_references_heading, titles_equal, titles_match};

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::error::Diagnostic;
use crate::model::{Document, EntryId, Page, SectionText, SectionValue, Span};
use crate::normalize::SpanNormalizer;
use crate::outline::OutlineTree;
use crate::typography::TypographyBaseline;

/// Segmentation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOptions {
    /// Height of the header and footer bands on paged layouts
    pub margin: f32,
    /// Only this many leading lines of a block are checked for headings
    pub heading_line_limit: usize,
}

impl SegmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_heading_line_limit(mut self, limit: usize) -> Self {
        self.heading_line_limit = limit;
        self
    }
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            margin: 50.0,
            heading_line_limit: 4,
        }
    }
}

/// Scan position: a block on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor {
    /// Page number (1-indexed)
    pub page: u32,
    /// Block index on the page
    pub block: usize,
}

impl Cursor {
    pub fn new(page: u32, block: usize) -> Self {
        Self { page, block }
    }

    /// The first block of a page.
    pub fn page_start(page: u32) -> Self {
        Self { page, block: 0 }
    }
}

/// Extracted sections plus the problems met on the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Segmentation {
    pub sections: SectionText,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    InBody,
    InSubsection,
    Done,
}

/// Splits a document's text into outline sections.
pub struct Segmenter<'a> {
    doc: &'a Document,
    baseline: &'a TypographyBaseline,
    tree: &'a OutlineTree,
    options: SegmentOptions,
    normalizer: SpanNormalizer,
    folio: Regex,
    caption: Regex,
}

impl<'a> Segmenter<'a> {
    pub fn new(doc: &'a Document, baseline: &'a TypographyBaseline, tree: &'a OutlineTree) -> Self {
        Self {
            doc,
            baseline,
            tree,
            options: SegmentOptions::default(),
            normalizer: SpanNormalizer::new(),
            folio: Regex::new(r"^\s?\d+\s?$").unwrap(),
            caption: Regex::new(r"^(?:Fig(?:ure)?\.?\s?\d*\w*\s*:|Table\s?\d*\w*\s*:)").unwrap(),
        }
    }

    pub fn with_options(mut self, options: SegmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract the text of the requested entries.
    ///
    /// Entries whose ancestor is also requested are reached through that
    /// ancestor and not repeated at the top level.
    pub fn extract(&self, targets: &[EntryId]) -> Segmentation {
        let mut diagnostics = Vec::new();
        let mut sections = SectionText::new();
        let requested: HashSet<EntryId> = targets.iter().copied().collect();

        for &id in targets {
            let Some(entry) = self.tree.entry(id) else {
                log::warn!("Unknown outline entry {:?}, skipping", id);
                continue;
            };
            if self.has_requested_ancestor(id, &requested) {
                continue;
            }
            let start = Cursor::page_start(entry.start_page);
            let (value, _) = self.scan_section(id, start, &mut diagnostics);
            sections.insert(entry.title.clone(), value);
        }

        Segmentation {
            sections,
            diagnostics,
        }
    }

    /// Segment `targets` in order, starting no earlier than `start`.
    ///
    /// Returns the sections and the position where scanning stopped, so a
    /// caller can continue from there.
    pub fn segment_from(&self, targets: &[EntryId], start: Cursor) -> (Segmentation, Cursor) {
        let mut diagnostics = Vec::new();
        let (sections, cursor) = self.scan_targets(targets, start, &mut diagnostics);
        (
            Segmentation {
                sections,
                diagnostics,
            },
            cursor,
        )
    }

    /// Body text of the whole document, with the same header, footer,
    /// caption and folio filtering as section text.
    ///
    /// Used when a document has no outline to segment by.
    pub fn whole_text(&self) -> String {
        let mut body = String::new();
        for page in &self.doc.pages {
            for index in 0..page.blocks.len() {
                if !self.is_content_block(page, index) {
                    continue;
                }
                for line in &page.blocks[index].lines {
                    self.append_spans(&mut body, &self.normalizer.merge_line(line));
                }
            }
        }
        self.normalizer.cleaner().finish_section(&body)
    }

    fn scan_targets(
        &self,
        targets: &[EntryId],
        start: Cursor,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (SectionText, Cursor) {
        let requested: HashSet<EntryId> = targets.iter().copied().collect();
        let mut sections = SectionText::new();
        let mut cursor = start;

        for &id in targets {
            let Some(entry) = self.tree.entry(id) else {
                continue;
            };
            if self.has_requested_ancestor(id, &requested) {
                continue;
            }
            let from = cursor.max(Cursor::page_start(entry.start_page));
            let (value, stop) = self.scan_section(id, from, diagnostics);
            cursor = stop;
            sections.insert(entry.title.clone(), value);
        }
        (sections, cursor)
    }

    fn has_requested_ancestor(&self, id: EntryId, requested: &HashSet<EntryId>) -> bool {
        self.tree
            .ancestors(id)
            .iter()
            .any(|a| requested.contains(a))
    }

    /// Scan one section. A section whose heading is never found yields an
    /// empty value and leaves the cursor where it was.
    fn scan_section(
        &self,
        id: EntryId,
        start: Cursor,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (SectionValue, Cursor) {
        let entry = &self.tree.entries()[id.index()];
        let next = self.tree.next_sibling(id).and_then(|n| self.tree.entry(n));
        let first_child = self
            .tree
            .children(id)
            .first()
            .and_then(|c| self.tree.entry(*c));

        let mut state = ScanState::Seeking;
        let mut body = String::new();
        let mut children = SectionText::new();
        let mut cursor = start;

        'pages: while cursor.page <= entry.end_page {
            let Some(page) = self.doc.page(cursor.page) else {
                break;
            };

            while cursor.block < page.blocks.len() {
                let index = cursor.block;
                if !self.is_content_block(page, index) {
                    cursor.block += 1;
                    continue;
                }

                let mut resume = None;
                for (line_no, line) in page.blocks[index].lines.iter().enumerate() {
                    let spans = self.normalizer.merge_line(line);
                    let Some(first) = spans.first() else {
                        continue;
                    };
                    let heading = line_no < self.options.heading_line_limit
                        && self.baseline.differs(first);
                    let is_next = |text: &str| next.is_some_and(|n| titles_match(text, &n.title));

                    match state {
                        ScanState::Seeking => {
                            if self.is_folio(first) || !heading {
                                continue;
                            }
                            if titles_match(&first.text, &entry.title) {
                                state = ScanState::InBody;
                                self.append_spans(&mut body, &spans[1..]);
                            } else if is_next(&first.text) || is_references_heading(&first.text) {
                                log::debug!(
                                    "\"{}\" reached {:?} before its heading, abandoning",
                                    entry.title,
                                    first.text
                                );
                                break 'pages;
                            }
                        }
                        ScanState::InBody => {
                            if self.is_folio(first) {
                                continue;
                            } else if !heading {
                                self.append_spans(&mut body, &spans);
                            } else if titles_equal(&first.text, &entry.title) {
                                continue;
                            } else if is_next(&first.text) || is_references_heading(&first.text) {
                                state = ScanState::Done;
                                cursor.block = index;
                                break 'pages;
                            } else if first_child.is_some_and(|c| titles_match(&first.text, &c.title)) {
                                let descendants = self.tree.descendants(id);
                                let here = Cursor::new(page.number, index);
                                let (nested, stop) =
                                    self.scan_targets(&descendants, here, diagnostics);
                                children.extend(nested);
                                state = ScanState::InSubsection;
                                resume = Some(stop.max(here));
                                break;
                            } else {
                                diagnostics.push(Diagnostic::AmbiguousHeadingMatch {
                                    section: entry.title.clone(),
                                    text: first.text.clone(),
                                    page: page.number,
                                });
                                self.append_spans(&mut body, &spans);
                            }
                        }
                        ScanState::InSubsection => {
                            if heading && is_next(&first.text) {
                                state = ScanState::Done;
                                cursor.block = index;
                                break 'pages;
                            }
                        }
                        ScanState::Done => break 'pages,
                    }
                }

                match resume {
                    Some(stop) => {
                        cursor = stop;
                        continue 'pages;
                    }
                    None => cursor.block += 1,
                }
            }
            cursor = Cursor::page_start(cursor.page + 1);
        }

        if state == ScanState::Seeking {
            log::debug!("No heading found for \"{}\"", entry.title);
            diagnostics.push(Diagnostic::EmptyExtraction {
                title: entry.title.clone(),
            });
            return (SectionValue::Text(String::new()), start);
        }

        let text = self.normalizer.cleaner().finish_section(&body);
        let value = if children.is_empty() {
            SectionValue::Text(text)
        } else {
            SectionValue::Nested { text, children }
        };
        (value, cursor)
    }

    /// Whether a block carries section text: inside the body frame, not an
    /// image, not a caption.
    fn is_content_block(&self, page: &Page, index: usize) -> bool {
        let block = &page.blocks[index];
        if block.is_image() || !self.doc.layout.is_body_block(block, page, self.options.margin) {
            return false;
        }

        let Some(first_line) = block.lines.first() else {
            return false;
        };
        let spans = self.normalizer.merge_line(first_line);
        let Some(first) = spans.first() else {
            return true;
        };

        let after_image = index > 0 && page.blocks[index - 1].is_image();
        if after_image
            && (first.font != self.baseline.main_font || first.size < self.baseline.main_size)
        {
            return false;
        }
        !self.caption.is_match(&first.text)
    }

    /// A bare page number set below the body size.
    fn is_folio(&self, span: &Span) -> bool {
        self.folio.is_match(&span.text) && span.size < self.baseline.main_size
    }

    fn append_spans(&self, body: &mut String, spans: &[Span]) {
        for span in spans.iter().filter(|s| !self.is_folio(s)) {
            append_body(body, &span.text);
        }
    }
}

/// Append text to a section body, repairing line-end hyphenation.
fn append_body(body: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if body.is_empty() {
        body.push_str(text);
        return;
    }

    let mut tail = body.chars().rev();
    let hyphenated = tail.next() == Some('-');
    if hyphenated {
        let letter_before = tail.next().is_some_and(char::is_alphabetic);
        if letter_before && text.starts_with(char::is_lowercase) {
            body.pop();
        }
    } else {
        body.push(' ');
    }
    body.push_str(text);
}
