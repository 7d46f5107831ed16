//! Error and diagnostic types for sectify.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for sectify operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised while opening or rendering a document.
///
/// Problems scoped to a single outline entry or section are never errors;
/// they are reported as [`Diagnostic`] values next to the result.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is neither a PDF nor an EPUB container.
    #[error("Unsupported document format: expected PDF or EPUB")]
    UnsupportedFormat,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error reading the EPUB container or its package files.
    #[error("EPUB error: {0}")]
    Epub(String),

    /// Malformed XML or XHTML inside an EPUB.
    #[error("XML error: {0}")]
    Xml(String),

    /// The document structure is corrupted or malformed.
    #[error("Corrupted document structure: {0}")]
    Corrupted(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Error during rendering (JSON, Markdown, notes).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            _ => Error::Epub(err.to_string()),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// A recoverable problem noticed during outline extraction or segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An outline entry had an impossible page range and was clamped.
    MalformedOutlineEntry {
        title: String,
        start_page: u32,
        end_page: u32,
    },

    /// A heading-styled line matched no known title and was kept as body text.
    AmbiguousHeadingMatch {
        section: String,
        text: String,
        page: u32,
    },

    /// A requested section's heading was never found; its text is empty.
    EmptyExtraction { title: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedOutlineEntry {
                title,
                start_page,
                end_page,
            } => write!(
                f,
                "outline entry \"{}\" had pages {}..{}, clamped",
                title, start_page, end_page
            ),
            Diagnostic::AmbiguousHeadingMatch {
                section,
                text,
                page,
            } => write!(
                f,
                "heading \"{}\" on page {} inside \"{}\" kept as body text",
                text, page, section
            ),
            Diagnostic::EmptyExtraction { title } => {
                write!(f, "no heading found for \"{}\"", title)
            }
        }
    }
}
