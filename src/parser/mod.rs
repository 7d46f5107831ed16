//! Document parsers.
//!
//! Both formats produce the same [`Document`] model: PDF pages laid out
//! from their content streams, EPUB spine items flattened from XHTML.

mod epub;
mod layout;
mod options;
mod pdf_parser;

pub use epub::EpubParser;
pub use layout::LayoutAnalyzer;
pub use options::{ErrorMode, ParseOptions};
pub use pdf_parser::PdfParser;

use std::path::Path;

use crate::detect::{detect_format_from_bytes, detect_format_from_path, DocumentFormat};
use crate::error::Result;
use crate::model::Document;

/// A loaded document that can be parsed into the document model.
pub trait DocumentParser {
    /// Parse into pages, metadata and the embedded outline.
    fn parse(&self) -> Result<Document>;
}

impl DocumentParser for PdfParser {
    fn parse(&self) -> Result<Document> {
        PdfParser::parse(self)
    }
}

impl DocumentParser for EpubParser {
    fn parse(&self) -> Result<Document> {
        EpubParser::parse(self)
    }
}

/// Open a file with the parser for its detected format.
pub fn open_parser<P: AsRef<Path>>(
    path: P,
    options: ParseOptions,
) -> Result<Box<dyn DocumentParser>> {
    let path = path.as_ref();
    let format = detect_format_from_path(path)?;
    log::debug!("Opening {} as {}", path.display(), format);

    Ok(match format {
        DocumentFormat::Pdf { .. } => Box::new(PdfParser::open_with_options(path, options)?),
        DocumentFormat::Epub => Box::new(EpubParser::open_with_options(path, options)?),
    })
}

/// Parse in-memory bytes with the parser for their detected format.
pub fn parse_bytes(data: &[u8], options: ParseOptions) -> Result<Document> {
    match detect_format_from_bytes(data)? {
        DocumentFormat::Pdf { .. } => PdfParser::from_bytes_with_options(data, options)?.parse(),
        DocumentFormat::Epub => EpubParser::from_bytes_with_options(data.to_vec(), options)?.parse(),
    }
}
