//! Markdown rendering for extracted sections.

use crate::model::{Metadata, SectionText, SectionValue};

use super::RenderOptions;

/// Render sections as Markdown, one heading per section.
///
/// Nested sections become deeper headings. The document title, when known,
/// is written as a level-1 heading above them.
pub fn to_markdown(metadata: &Metadata, sections: &SectionText, options: &RenderOptions) -> String {
    let mut output = String::new();

    if options.include_frontmatter {
        output.push_str(&metadata.to_yaml_frontmatter());
        output.push('\n');
    }
    if let Some(title) = metadata.title.as_deref().filter(|t| !t.trim().is_empty()) {
        output.push_str(&format!("# {}\n\n", title.trim()));
    }

    render_sections(&mut output, sections, 0, options);
    output.trim_end().to_string() + "\n"
}

fn render_sections(output: &mut String, sections: &SectionText, depth: usize, options: &RenderOptions) {
    for (title, value) in sections.iter() {
        if value.is_empty() && !options.include_empty {
            continue;
        }

        let level = options.heading_level(depth);
        output.push_str(&"#".repeat(level));
        output.push(' ');
        output.push_str(&escape_heading(title));
        output.push_str("\n\n");

        let text = value.text();
        if !text.is_empty() {
            output.push_str(text);
            output.push_str("\n\n");
        }
        if let SectionValue::Nested { children, .. } = value {
            render_sections(output, children, depth + 1, options);
        }
    }
}

/// Keep a title from being read as something other than heading text.
fn escape_heading(title: &str) -> String {
    let title = title.trim().replace('\n', " ");
    match title.chars().next() {
        Some('#') => format!("\\{}", title),
        _ => title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> SectionText {
        let mut children = SectionText::new();
        children.insert("Data", SectionValue::Text("We sampled.".into()));
        children.insert("Analysis", SectionValue::Text(String::new()));
        let mut sections = SectionText::new();
        sections.insert(
            "Methods",
            SectionValue::Nested {
                text: "Overview.".into(),
                children,
            },
        );
        sections
    }

    #[test]
    fn test_nested_headings() {
        let mut metadata = Metadata::with_format("PDF 1.7");
        metadata.title = Some("Paper".into());

        let md = to_markdown(&metadata, &sections(), &RenderOptions::default());
        assert_eq!(
            md,
            "# Paper\n\n## Methods\n\nOverview.\n\n### Data\n\nWe sampled.\n\n### Analysis\n"
        );
    }

    #[test]
    fn test_frontmatter_and_empty_sections() {
        let metadata = Metadata::with_format("EPUB 3.0");
        let options = RenderOptions::new()
            .with_frontmatter(true)
            .with_empty_sections(false);

        let md = to_markdown(&metadata, &sections(), &options);
        assert!(md.starts_with("---\n"));
        assert!(md.contains("format: \"EPUB 3.0\""));
        assert!(md.contains("### Data"));
        assert!(!md.contains("Analysis"));
    }

    #[test]
    fn test_escape_heading() {
        assert_eq!(escape_heading("#1 Rule"), "\\#1 Rule");
        assert_eq!(escape_heading(" Two\nLines "), "Two Lines");
    }
}
