//! Dominant body typography.
//!
//! Body text is whatever font and size occur most often. Headings, folios
//! and captions are then recognized by differing from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Document, Span};

/// Size assumed when a document has no text at all.
pub const DEFAULT_MAIN_SIZE: f32 = 12.0;

/// The dominant body font and rounded size of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypographyBaseline {
    pub main_font: String,
    pub main_size: f32,
}

impl TypographyBaseline {
    /// Estimate the baseline over every span of every page.
    pub fn estimate(doc: &Document) -> Self {
        let spans = doc
            .pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .flat_map(|l| &l.spans);
        Self::from_spans(spans)
    }

    /// Estimate the baseline over an arbitrary span sequence.
    pub fn from_spans<'a, I>(spans: I) -> Self
    where
        I: IntoIterator<Item = &'a Span>,
    {
        let mut fonts = FrequencyTable::default();
        let mut sizes = FrequencyTable::default();

        for span in spans.into_iter().filter(|s| !s.is_blank()) {
            fonts.add(span.font.clone());
            sizes.add(span.rounded_size());
        }

        let main_font = fonts.ranked().first().map(|(f, _)| f.clone()).unwrap_or_default();

        let ranked_sizes = sizes.ranked();
        let main_size = match ranked_sizes.as_slice() {
            [] => DEFAULT_MAIN_SIZE,
            [(top, _)] => *top as f32,
            [(top, top_count), (second, second_count), ..] => {
                // Large body fonts sometimes lose the count to dense small print.
                if second > top && *second_count * 2 > *top_count {
                    *second as f32
                } else {
                    *top as f32
                }
            }
        };

        log::debug!("Typography baseline: font={:?} size={}", main_font, main_size);
        Self {
            main_font,
            main_size,
        }
    }

    /// Whether a span's font or rounded size departs from the baseline.
    pub fn differs(&self, span: &Span) -> bool {
        span.font != self.main_font || span.rounded_size() as f32 != self.main_size
    }
}

impl Default for TypographyBaseline {
    fn default() -> Self {
        Self {
            main_font: String::new(),
            main_size: DEFAULT_MAIN_SIZE,
        }
    }
}

/// Occurrence counter that remembers first-seen order for tie breaking.
struct FrequencyTable<K> {
    counts: HashMap<K, (usize, usize)>,
}

impl<K> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone> FrequencyTable<K> {
    fn add(&mut self, key: K) {
        let next = self.counts.len();
        self.counts.entry(key).or_insert((0, next)).0 += 1;
    }

    /// Keys by descending count, then by first occurrence.
    fn ranked(&self) -> Vec<(K, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(k, (count, order))| (k.clone(), *count, *order))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries.into_iter().map(|(k, c, _)| (k, c)).collect()
    }
}
