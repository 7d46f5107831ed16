//! Document format detection.
//!
//! PDF files are recognized by their `%PDF-x.y` header. EPUB files are ZIP
//! containers whose `mimetype` entry reads `application/epub+zip`; the
//! EPUB container format requires that entry to be stored first and uncompressed, so
//! well-formed books can be sniffed from the header alone.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::error::{Error, Result};

/// Detected document format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Fixed-layout PDF with its header version (e.g. "1.7").
    Pdf { version: String },
    /// Reflowable EPUB container.
    Epub,
}

impl DocumentFormat {
    /// Whether the format has fixed page geometry.
    pub fn is_paged(&self) -> bool {
        matches!(self, DocumentFormat::Pdf { .. })
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Pdf { version } => write!(f, "PDF {}", version),
            DocumentFormat::Epub => write!(f, "EPUB"),
        }
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";
/// Offset of the file name in a ZIP local file header.
const ZIP_NAME_OFFSET: usize = 30;

/// Detect the format of a file on disk.
///
/// A ZIP whose `mimetype` entry is not stored first is opened and checked
/// through the archive directory.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<DocumentFormat> {
    let mut file = File::open(path)?;
    let mut header = Vec::with_capacity(64);
    (&mut file).take(64).read_to_end(&mut header)?;

    match detect_format_from_bytes(&header) {
        Ok(format) => Ok(format),
        Err(Error::UnsupportedFormat) if header.starts_with(ZIP_MAGIC) => {
            file.rewind()?;
            if zip_has_epub_mimetype(file) {
                Ok(DocumentFormat::Epub)
            } else {
                Err(Error::UnsupportedFormat)
            }
        }
        Err(e) => Err(e),
    }
}

/// Detect the format from the leading bytes of a file.
///
/// # Returns
/// * `Ok(DocumentFormat)` for a PDF header or an EPUB `mimetype` entry
/// * `Err(Error::UnsupportedFormat)` for anything else
pub fn detect_format_from_bytes(data: &[u8]) -> Result<DocumentFormat> {
    if data.starts_with(PDF_MAGIC) {
        if data.len() < PDF_MAGIC_LEN + VERSION_LEN {
            return Err(Error::UnsupportedFormat);
        }
        let version_bytes = &data[PDF_MAGIC_LEN..PDF_MAGIC_LEN + VERSION_LEN];
        let version = String::from_utf8_lossy(version_bytes).to_string();
        if !is_valid_version(&version) {
            return Err(Error::Corrupted(format!("bad PDF version {:?}", version)));
        }
        return Ok(DocumentFormat::Pdf { version });
    }

    if data.starts_with(ZIP_MAGIC) && header_names_epub_mimetype(data) {
        return Ok(DocumentFormat::Epub);
    }

    Err(Error::UnsupportedFormat)
}

/// Check if a version string looks like "1.7".
fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

fn header_names_epub_mimetype(data: &[u8]) -> bool {
    let Some(rest) = data.get(ZIP_NAME_OFFSET..) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix(b"mimetype".as_slice()) else {
        return false;
    };
    rest.starts_with(EPUB_MIMETYPE)
}

fn zip_has_epub_mimetype<R: Read + Seek>(reader: R) -> bool {
    let Ok(mut archive) = zip::ZipArchive::new(reader) else {
        return false;
    };
    let Ok(mut entry) = archive.by_name("mimetype") else {
        return false;
    };
    let mut content = String::new();
    entry.read_to_string(&mut content).is_ok() && content.trim().as_bytes() == EPUB_MIMETYPE
}

/// Check if a file is a PDF or EPUB this crate can open.
pub fn is_supported<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}
