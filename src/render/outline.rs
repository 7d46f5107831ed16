//! Numbered outline listings.

use crate::model::OutlineEntry;

/// One line per entry: 1-based index, indentation by level, page range.
///
/// The index is the one the CLI accepts for `--index` selection.
pub fn outline_listing(entries: &[OutlineEntry]) -> String {
    let width = entries.len().to_string().len();
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let indent = "  ".repeat(entry.level.saturating_sub(1) as usize);
            let pages = if entry.start_page == entry.end_page {
                format!("p. {}", entry.start_page)
            } else {
                format!("pp. {}-{}", entry.start_page, entry.end_page)
            };
            format!("{:>width$}. {}{} ({})", i + 1, indent, entry.title, pages, width = width)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_listing() {
        let entries = vec![
            OutlineEntry::with_range(1, "Introduction", 1, 3),
            OutlineEntry::with_range(2, "Scope", 2, 2),
        ];
        assert_eq!(
            outline_listing(&entries),
            "1. Introduction (pp. 1-3)\n2.   Scope (p. 2)"
        );
    }

    #[test]
    fn test_index_width_aligns() {
        let entries: Vec<_> = (1..=10)
            .map(|p| OutlineEntry::with_range(1, format!("S{}", p), p, p))
            .collect();
        let listing = outline_listing(&entries);
        assert!(listing.starts_with(" 1. S1"));
        assert!(listing.ends_with("10. S10 (p. 10)"));
    }
}
