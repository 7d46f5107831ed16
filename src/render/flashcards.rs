//! Anki-importable flashcard decks.
//!
//! Decks are written as tab-separated text with Anki's file headers. The
//! deck id is always supplied by the caller.

use std::path::Path;

use super::notes::parse_qa;

/// Target deck of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub id: u64,
    pub name: String,
}

impl Deck {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A single note to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Card {
    /// Question on the front, answer on the back
    Basic { front: String, back: String },
    /// Question with the answer as a cloze deletion
    Cloze { text: String },
}

impl Card {
    fn note_type(&self) -> &'static str {
        match self {
            Card::Basic { .. } => "Basic",
            Card::Cloze { .. } => "Cloze",
        }
    }

    fn fields(&self) -> (&str, &str) {
        match self {
            Card::Basic { front, back } => (front, back),
            Card::Cloze { text } => (text, ""),
        }
    }
}

const QUANTITATIVE_PHRASES: &[&str] = &[
    "how many",
    "how much",
    "what is the value",
    "compute",
    "calculate",
    "determine",
    "estimate",
    "give the value",
    "at what time",
    "what is the result",
];

/// Whether a question asks for a quantity.
pub fn is_quantitative_question(question: &str) -> bool {
    let question = question.to_lowercase();
    QUANTITATIVE_PHRASES.iter().any(|p| question.contains(p))
}

/// Cards for one question/answer pair.
///
/// Every pair becomes a basic card. Quantitative questions with a numeric
/// answer also get a cloze card that hides the answer.
pub fn cards_for(question: &str, answer: &str) -> Vec<Card> {
    let mut cards = vec![Card::Basic {
        front: question.to_string(),
        back: answer.to_string(),
    }];
    if is_quantitative_question(question) && answer.chars().any(|c| c.is_ascii_digit()) {
        cards.push(Card::Cloze {
            text: format!("{} {{{{c1::{}}}}}", question, answer),
        });
    }
    cards
}

/// Cards for every answered pair in `Q: ... A: ...` text.
pub fn cards_from_qa(qa: &str) -> Vec<Card> {
    parse_qa(qa)
        .into_iter()
        .filter(|(_, answer)| !answer.is_empty())
        .flat_map(|(question, answer)| cards_for(&question, &answer))
        .collect()
}

/// Write a deck as Anki import text.
pub fn write_deck(deck: &Deck, cards: &[Card]) -> String {
    let mut output = String::new();
    output.push_str("#separator:tab\n");
    output.push_str("#html:false\n");
    output.push_str("#notetype column:1\n");
    output.push_str(&format!("#deck:{}\n", field(&deck.name)));
    output.push_str(&format!("#deck id:{}\n", deck.id));

    for card in cards {
        let (front, back) = card.fields();
        output.push_str(&format!("{}\t{}\t{}\n", card.note_type(), field(front), field(back)));
    }
    output
}

/// Tabs and line breaks would split a row.
fn field(text: &str) -> String {
    text.split(['\t', '\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output file stem from the document title, falling back to the input
/// file's stem. Spaces become underscores and path separators are dropped.
pub fn output_stem(title: Option<&str>, input: &Path) -> String {
    let stem = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "document".to_string());

    stem.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_deck() {
        let deck = Deck::new(1_234_567, "Field\tNotes");
        let cards = cards_from_qa(
            "Q: How many sites were sampled?\nA: 12 sites.\nQ: Who led it?\nA: The\tteam.\nQ: Open?",
        );
        let tsv = write_deck(&deck, &cards);
        let lines: Vec<_> = tsv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "#separator:tab",
                "#html:false",
                "#notetype column:1",
                "#deck:Field Notes",
                "#deck id:1234567",
                "Basic\tHow many sites were sampled?\t12 sites.",
                "Cloze\tHow many sites were sampled? {{c1::12 sites.}}\t",
                "Basic\tWho led it?\tThe team.",
            ]
        );
    }

    #[test]
    fn test_quantitative_needs_number() {
        assert_eq!(cards_for("How much time passed?", "A while").len(), 1);
        assert_eq!(cards_for("Calculate the mean", "3.5").len(), 2);
        assert!(!is_quantitative_question("Why does it matter?"));
    }

    #[test]
    fn test_output_stem() {
        let input = Path::new("/tmp/paper.pdf");
        assert_eq!(output_stem(Some("Deep Sea Survey"), input), "Deep_Sea_Survey");
        assert_eq!(output_stem(Some("A/B: tests"), input), "AB_tests");
        assert_eq!(output_stem(Some("  "), input), "paper");
        assert_eq!(output_stem(None, input), "paper");
    }
}
