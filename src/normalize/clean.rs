//! Character-level cleanup for span and section text.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const SOFT_HYPHEN: char = '\u{00AD}';

/// Typographic ligature glyphs and their letter sequences.
pub(crate) const LIGATURES: [(char, &str); 7] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

pub(crate) fn is_ligature(c: char) -> bool {
    LIGATURES.iter().any(|(l, _)| *l == c)
}

/// Unicode spaces that PDF producers emit instead of U+0020.
fn is_spacing_artifact(c: char) -> bool {
    matches!(c, '\u{2000}'..='\u{200A}' | '\u{202F}')
}

/// Regex-driven cleanup shared by the span normalizer and the segmenter.
pub struct TextCleaner {
    citation: Regex,
    open_paren: Regex,
    close_paren: Regex,
    space_before_punct: Regex,
    whitespace: Regex,
    wrap_artifact: Regex,
    capital_split: Regex,
    leading_lowercase: Regex,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            citation: Regex::new(r"(?:;\s)?\[\s*\d+(?:\s*[,–-]\s*\d+)*\s*\]").unwrap(),
            open_paren: Regex::new(r"\(\s+").unwrap(),
            close_paren: Regex::new(r"\s+\)").unwrap(),
            space_before_punct: Regex::new(r"\s+([,.])(\s|$)").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
            wrap_artifact: Regex::new(r"[\u{00AD}\u{00A0}]\s").unwrap(),
            capital_split: Regex::new(r"\s+([.,:?!])([A-Z])").unwrap(),
            leading_lowercase: Regex::new(r"^[a-z]+\.?\s?(\w+)").unwrap(),
        }
    }

    /// Clean one merged span.
    ///
    /// A soft hyphen at the very end becomes a real hyphen so the line join
    /// can repair the word; interior soft hyphens are dropped.
    pub fn clean_span(&self, text: &str) -> String {
        let mut result: String = text
            .chars()
            .map(|c| if is_spacing_artifact(c) { ' ' } else { c })
            .collect();

        let trimmed_end = result.trim_end();
        if trimmed_end.ends_with(SOFT_HYPHEN) {
            let cut = trimmed_end.len() - SOFT_HYPHEN.len_utf8();
            result = format!("{}-", &result[..cut]);
        }
        result = result.replace(SOFT_HYPHEN, "");

        let result = result.trim();
        let result = self.citation.replace_all(result, "");
        let result = self.open_paren.replace_all(&result, "(");
        let result = self.close_paren.replace_all(&result, ")");
        let result = self.space_before_punct.replace_all(&result, "$1$2");
        let result = self.whitespace.replace_all(&result, " ");

        let mut result = result.trim().to_string();
        for (ligature, replacement) in LIGATURES {
            if result.contains(ligature) {
                result = result.replace(ligature, replacement);
            }
        }
        result.nfc().collect()
    }

    /// Final pass over a section's accumulated body text.
    pub fn finish_section(&self, text: &str) -> String {
        let result = self.wrap_artifact.replace_all(text, "");
        let result = self.capital_split.replace_all(&result, "$1 $2");
        let mut result = result.trim().to_string();

        if let Some(rest) = result.strip_prefix(". ") {
            result = rest.to_string();
        }
        if self.leading_lowercase.is_match(&result) {
            result = self.leading_lowercase.replace(&result, "$1").to_string();
        }
        result
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}
