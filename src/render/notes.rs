//! Study notes built from section text by an external summarizer.
//!
//! Summaries and question/answer text come from a [`Summarizer`], usually a
//! language model behind some remote API. This module only drives it over
//! the extracted sections and lays the results out as Markdown.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::SectionText;

/// Summary of one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub key_concepts: Vec<String>,
}

/// Produces summaries and question/answer text for a section's body.
pub trait Summarizer {
    /// Summarize a section.
    fn summarize(&self, text: &str) -> Result<Summary>;

    /// Generate `Q: ... A: ...` pairs for a section.
    fn generate_qa(&self, text: &str) -> Result<String>;
}

/// Notes for one section: title, summary and raw Q/A text.
pub type SectionNotes = (String, Summary, String);

/// Run the summarizer over every section that has text.
///
/// Nested sections are visited depth-first. Sections with no text are
/// skipped, so a heading that was never found costs no summarizer call.
pub fn summarize_sections<S: Summarizer + ?Sized>(
    summarizer: &S,
    sections: &SectionText,
) -> Result<Vec<SectionNotes>> {
    let mut notes = Vec::new();
    for (title, text) in sections.flatten() {
        if text.trim().is_empty() {
            log::debug!("Skipping empty section {:?}", title);
            continue;
        }
        let summary = summarizer.summarize(&text)?;
        let qa = summarizer.generate_qa(&text)?;
        notes.push((title, summary, qa));
    }
    Ok(notes)
}

/// Lay out study notes as Markdown.
///
/// Each section gets its summary, key concepts and numbered questions; the
/// answers are collected in a final block so they can be covered up.
pub fn write_study_notes(title: &str, sections: &[SectionNotes]) -> String {
    let mut output = format!("# {}\n\n\n", title);
    let mut answers: Vec<Vec<String>> = Vec::new();

    for (i, (section, summary, qa)) in sections.iter().enumerate() {
        output.push_str(&format!("## {}. {}\n", i + 1, capitalize(section)));
        if !summary.summary.trim().is_empty() {
            output.push_str(summary.summary.trim());
            output.push_str("\n\n");
        }
        if !summary.key_concepts.is_empty() {
            output.push_str("### Key concepts\n");
            for concept in &summary.key_concepts {
                output.push_str(&format!("- {}\n", concept.trim()));
            }
            output.push('\n');
        }

        let pairs = parse_qa(qa);
        output.push_str("### Questions\n");
        let questions: Vec<String> = pairs
            .iter()
            .enumerate()
            .map(|(n, (q, _))| format!("- **Q{}:** {}", n + 1, q))
            .collect();
        output.push_str(&questions.join("\n"));
        output.push_str("\n\n\n");

        answers.push(
            pairs
                .iter()
                .enumerate()
                .filter(|(_, (_, a))| !a.is_empty())
                .map(|(n, (_, a))| format!("- **A{}:** {}", n + 1, a))
                .collect(),
        );
    }

    output.push_str("## Answers\n");
    for (i, ((section, _, _), section_answers)) in sections.iter().zip(&answers).enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, capitalize(section)));
        output.push_str(&section_answers.join("\n"));
        output.push_str("\n\n");
    }

    output
}

/// Split `Q: ... A: ...` text into pairs. A question without an answer gets
/// an empty answer.
pub fn parse_qa(text: &str) -> Vec<(String, String)> {
    let question_start = Regex::new(r"(?m)^[ \t]*Q:[ \t]*").unwrap();
    let answer_start = Regex::new(r"(?m)^[ \t]*A:[ \t]*").unwrap();

    let starts: Vec<(usize, usize)> = question_start
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &(_, body_start))| {
            let end = starts.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
            let chunk = &text[body_start..end];
            let (question, answer) = match answer_start.find(chunk) {
                Some(m) => (&chunk[..m.start()], &chunk[m.end()..]),
                None => (chunk, ""),
            };
            let question = collapse(question);
            if question.is_empty() {
                return None;
            }
            Some((question, collapse(answer)))
        })
        .collect()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
