//! Fuzzy heading comparison.

/// Reduce a title to its lowercase alphanumeric characters.
fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a heading on the page and an outline title name the same section.
///
/// Both sides are folded to lowercase alphanumerics; a match is containment
/// in either direction. Text that folds to nothing never matches.
pub fn titles_match(heading: &str, title: &str) -> bool {
    let heading = fold(heading);
    let title = fold(title);
    if heading.is_empty() || title.is_empty() {
        return false;
    }
    heading.contains(&title) || title.contains(&heading)
}

/// Whether a heading repeats a title exactly, ignoring case, spacing and
/// punctuation.
pub fn titles_equal(heading: &str, title: &str) -> bool {
    let heading = fold(heading);
    !heading.is_empty() && heading == fold(title)
}

/// Headings that end the body of a document even when absent from the outline.
pub fn is_references_heading(text: &str) -> bool {
    let text = text.trim().trim_end_matches([':', '.']).trim();
    text.eq_ignore_ascii_case("references") || text.eq_ignore_ascii_case("bibliography")
}
