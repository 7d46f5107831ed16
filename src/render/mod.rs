//! Rendering of extracted sections for downstream consumers.

pub mod flashcards;
mod json;
mod markdown;
pub mod notes;
mod options;
mod outline;
mod text;

pub use flashcards::{output_stem, write_deck, Card, Deck};
pub use json::{to_json, JsonFormat};
pub use markdown::to_markdown;
pub use notes::{parse_qa, summarize_sections, write_study_notes, Summarizer, Summary};
pub use options::RenderOptions;
pub use outline::outline_listing;
pub use text::to_text;
