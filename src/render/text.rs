//! Plain text rendering for extracted sections.

use crate::model::SectionText;

/// Render sections as plain text: an underlined title, then the body.
/// Nested sections are numbered after their parent ("2.1 Data").
pub fn to_text(sections: &SectionText) -> String {
    let mut output = String::new();
    render_sections(&mut output, sections, "");
    output.trim_end().to_string()
}

fn render_sections(output: &mut String, sections: &SectionText, prefix: &str) {
    for (i, (title, value)) in sections.iter().enumerate() {
        let number = format!("{}{}", prefix, i + 1);
        let heading = format!("{} {}", number, title.trim());
        let underline = if prefix.is_empty() { '=' } else { '-' };

        output.push_str(&heading);
        output.push('\n');
        output.push_str(&underline.to_string().repeat(heading.chars().count()));
        output.push_str("\n\n");

        if !value.text().is_empty() {
            output.push_str(value.text());
            output.push_str("\n\n");
        }
        if let Some(children) = value.children() {
            render_sections(output, children, &format!("{}.", number));
        }
    }
}
