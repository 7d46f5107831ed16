//! PDF document parser using lopdf.

use std::io::Read;
use std::path::Path;

use lopdf::Document as LopdfDocument;
use rayon::prelude::*;

use crate::detect::{detect_format_from_path, DocumentFormat};
use crate::error::{Error, Result};
use crate::model::{Document, Layout, Metadata, Outline, OutlineItem, Page};

use super::layout::LayoutAnalyzer;
use super::options::ParseOptions;

/// PDF document parser.
pub struct PdfParser {
    doc: LopdfDocument,
    options: ParseOptions,
}

impl PdfParser {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let path = path.as_ref();

        match detect_format_from_path(path)? {
            DocumentFormat::Pdf { .. } => {}
            _ => return Err(Error::UnsupportedFormat),
        }

        let doc = LopdfDocument::load(path).map_err(map_load_error)?;
        Ok(Self { doc, options })
    }

    /// Parse a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Parse a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data).map_err(map_load_error)?;
        Ok(Self { doc, options })
    }

    /// Parse a PDF from a reader.
    pub fn from_reader<R: Read>(mut reader: R, options: ParseOptions) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes_with_options(&data, options)
    }

    /// Parse the document into pages of blocks plus metadata and bookmarks.
    pub fn parse(&self) -> Result<Document> {
        let mut document = Document::new(Layout::Paged);
        document.metadata = self.extract_metadata();

        let page_numbers: Vec<u32> = self.doc.get_pages().keys().copied().collect();
        document.metadata.page_count = page_numbers.len() as u32;

        let pages: Vec<Result<Page>> = if self.options.parallel {
            page_numbers
                .par_iter()
                .map(|&num| self.parse_page(num))
                .collect()
        } else {
            page_numbers.iter().map(|&num| self.parse_page(num)).collect()
        };
        for page in pages {
            document.add_page(page?);
        }

        match self.extract_outline() {
            Ok(outline) if !outline.is_empty() => document.outline = Some(outline),
            Ok(_) => log::debug!("PDF has no bookmarks"),
            Err(e) => log::warn!("Failed to read PDF bookmarks: {}", e),
        }

        Ok(document)
    }

    fn extract_metadata(&self) -> Metadata {
        let mut metadata = Metadata::with_format(format!("PDF {}", self.doc.version));

        let info_dict = self
            .doc
            .trailer
            .get(b"Info")
            .and_then(|info| info.as_reference())
            .and_then(|info_ref| self.doc.get_dictionary(info_ref));

        if let Ok(info_dict) = info_dict {
            metadata.title = get_string_from_dict(info_dict, b"Title");
            metadata.author = get_string_from_dict(info_dict, b"Author");
            metadata.subject = get_string_from_dict(info_dict, b"Subject");
            metadata.creator = get_string_from_dict(info_dict, b"Creator");
            metadata.producer = get_string_from_dict(info_dict, b"Producer");

            if let Some(date_str) = get_string_from_dict(info_dict, b"CreationDate") {
                metadata.created = parse_pdf_date(&date_str);
            }
            if let Some(date_str) = get_string_from_dict(info_dict, b"ModDate") {
                metadata.modified = parse_pdf_date(&date_str);
            }
        }

        metadata
    }

    /// Lay out a single page. In lenient mode a broken page comes back empty.
    fn parse_page(&self, page_num: u32) -> Result<Page> {
        let (width, height) = self.get_page_dimensions(page_num)?;
        let analyzer = LayoutAnalyzer::new(&self.doc).with_images(self.options.extract_images);

        match analyzer.analyze_page(page_num, width, height) {
            Ok(page) => Ok(page),
            Err(e) if self.options.is_lenient() => {
                log::warn!("Failed to lay out page {}: {}", page_num, e);
                Ok(Page::new(page_num, width, height))
            }
            Err(e) => Err(e),
        }
    }

    fn get_page_dimensions(&self, page_num: u32) -> Result<(f32, f32)> {
        let pages = self.doc.get_pages();
        let page_id = pages
            .get(&page_num)
            .ok_or(Error::PageOutOfRange(page_num, pages.len() as u32))?;

        if let Ok(page_dict) = self.doc.get_dictionary(*page_id) {
            if let Ok(media_box) = page_dict.get(b"MediaBox") {
                if let Ok(array) = media_box.as_array() {
                    if array.len() >= 4 {
                        let x0 = array[0].as_float().unwrap_or(0.0);
                        let y0 = array[1].as_float().unwrap_or(0.0);
                        let width = array[2].as_float().map(|x1| x1 - x0).unwrap_or(612.0);
                        let height = array[3].as_float().map(|y1| y1 - y0).unwrap_or(792.0);
                        return Ok((width, height));
                    }
                }
            }
        }

        // Default to Letter size
        Ok((612.0, 792.0))
    }

    /// Read the bookmark tree from the catalog.
    fn extract_outline(&self) -> Result<Outline> {
        let mut outline = Outline::new();

        let first = self
            .doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Outlines"))
            .and_then(|outlines| outlines.as_reference())
            .and_then(|outlines_ref| self.doc.get_dictionary(outlines_ref))
            .and_then(|outlines_dict| outlines_dict.get(b"First"))
            .and_then(|first| first.as_reference());

        if let Ok(first_ref) = first {
            let mut visited = std::collections::HashSet::new();
            self.extract_outline_items(first_ref, &mut outline.items, &mut visited)?;
        }

        Ok(outline)
    }

    /// Walk a First/Next sibling chain, descending into children.
    fn extract_outline_items(
        &self,
        first: lopdf::ObjectId,
        items: &mut Vec<OutlineItem>,
        visited: &mut std::collections::HashSet<lopdf::ObjectId>,
    ) -> Result<()> {
        let mut current = Some(first);

        while let Some(item_ref) = current.take() {
            // Broken files can link outline items in a cycle.
            if !visited.insert(item_ref) {
                log::warn!("Outline item {:?} visited twice, stopping", item_ref);
                break;
            }
            let Ok(item_dict) = self.doc.get_dictionary(item_ref) else {
                break;
            };

            let title = get_string_from_dict(item_dict, b"Title").unwrap_or_default();
            let page = self.get_outline_destination(item_dict);
            let mut item = OutlineItem::new(title, page);

            if let Ok(child_ref) = item_dict.get(b"First").and_then(|f| f.as_reference()) {
                self.extract_outline_items(child_ref, &mut item.children, visited)?;
            }
            items.push(item);

            current = item_dict
                .get(b"Next")
                .and_then(|n| n.as_reference())
                .ok();
        }

        Ok(())
    }

    /// Destination page of an outline item, from `Dest` or a GoTo action.
    fn get_outline_destination(&self, item_dict: &lopdf::Dictionary) -> Option<u32> {
        if let Ok(dest) = item_dict.get(b"Dest") {
            return self.resolve_destination(dest);
        }

        let action = match item_dict.get(b"A").ok()? {
            lopdf::Object::Reference(r) => self.doc.get_dictionary(*r).ok()?,
            lopdf::Object::Dictionary(d) => d,
            _ => return None,
        };
        action.get(b"D").ok().and_then(|d| self.resolve_destination(d))
    }

    /// Resolve an explicit or named destination to a page number.
    fn resolve_destination(&self, dest: &lopdf::Object) -> Option<u32> {
        let dest = match dest {
            lopdf::Object::Reference(r) => self.doc.get_object(*r).ok()?,
            other => other,
        };

        match dest {
            lopdf::Object::Array(dest_array) => {
                let page_ref = dest_array.first()?.as_reference().ok()?;
                self.doc
                    .get_pages()
                    .into_iter()
                    .find(|(_, id)| *id == page_ref)
                    .map(|(num, _)| num)
            }
            lopdf::Object::String(name, _) | lopdf::Object::Name(name) => {
                self.resolve_named_destination(name)
            }
            _ => None,
        }
    }

    /// Look a name up in the catalog's `Dests` dictionary.
    fn resolve_named_destination(&self, name: &[u8]) -> Option<u32> {
        let dests = match self.doc.catalog().ok()?.get(b"Dests").ok()? {
            lopdf::Object::Reference(r) => self.doc.get_dictionary(*r).ok()?,
            lopdf::Object::Dictionary(d) => d,
            _ => return None,
        };
        let target = dests.get(name).ok()?;
        let target = match target {
            lopdf::Object::Reference(r) => self.doc.get_object(*r).ok()?,
            other => other,
        };
        let array = match target {
            lopdf::Object::Dictionary(d) => d.get(b"D").ok()?,
            other => other,
        };
        match array {
            lopdf::Object::Array(_) => self.resolve_destination(array),
            _ => None,
        }
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get PDF version.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }
}

fn map_load_error(e: lopdf::Error) -> Error {
    match e {
        lopdf::Error::Decryption(_) => Error::Encrypted,
        _ => Error::from(e),
    }
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        lopdf::Object::String(bytes, _) => decode_pdf_string(bytes),
        lopdf::Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    })
}

/// Decode a PDF text string: UTF-16BE with BOM, else UTF-8, else Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&utf16).ok();
    }
    String::from_utf8(bytes.to_vec())
        .ok()
        .or_else(|| Some(bytes.iter().map(|&b| b as char).collect()))
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);

    // At minimum we need YYYY
    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// A PDF whose pages each show one heading and one body line,
    /// with a bookmark per page.
    fn build_pdf(titles: &[&str]) -> Vec<u8> {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        });

        let mut kids = Vec::new();
        for title in titles {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F2".into(), 16.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*title)]),
                    Operation::new("Tf", vec!["F1".into(), 10.into()]),
                    Operation::new("Td", vec![0.into(), (-30).into()]),
                    Operation::new("Tj", vec![Object::string_literal("Body text.")]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id);
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
                "Count" => kids.len() as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let outlines_id = doc.new_object_id();
        let item_ids: Vec<_> = titles.iter().map(|_| doc.new_object_id()).collect();
        for (i, (title, page)) in titles.iter().zip(&kids).enumerate() {
            let mut item = dictionary! {
                "Title" => Object::string_literal(*title),
                "Parent" => outlines_id,
                "Dest" => vec![Object::Reference(*page), "Fit".into()],
            };
            if let Some(next) = item_ids.get(i + 1) {
                item.set("Next", *next);
            }
            doc.objects.insert(item_ids[i], Object::Dictionary(item));
        }
        doc.objects.insert(
            outlines_id,
            Object::Dictionary(dictionary! {
                "Type" => "Outlines",
                "First" => item_ids[0],
                "Last" => item_ids[item_ids.len() - 1],
                "Count" => item_ids.len() as i64,
            }),
        );

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Field Notes"),
            "Author" => Object::string_literal("A. Writer"),
            "CreationDate" => Object::string_literal("D:20240115103045"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Outlines" => outlines_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_parse_pages_metadata_and_bookmarks() {
        let bytes = build_pdf(&["Introduction", "Methods"]);
        for options in [ParseOptions::default(), ParseOptions::new().sequential()] {
            let parser = PdfParser::from_bytes_with_options(&bytes, options).unwrap();
            let doc = parser.parse().unwrap();

            assert_eq!(doc.layout, Layout::Paged);
            assert_eq!(doc.page_count(), 2);
            assert_eq!(doc.metadata.page_count, 2);
            assert_eq!(doc.metadata.format, "PDF 1.5");
            assert_eq!(doc.metadata.title.as_deref(), Some("Field Notes"));
            assert_eq!(doc.metadata.created.unwrap().year(), 2024);

            let page = doc.page(2).unwrap();
            assert_eq!(page.blocks.len(), 2);
            assert_eq!(page.blocks[0].plain_text(), "Methods");
            assert!(page.blocks[0].lines[0].spans[0].flags.is_bold());
            assert_eq!(page.blocks[1].plain_text(), "Body text.");

            let outline = doc.outline.as_ref().unwrap();
            let bookmarks: Vec<_> = outline
                .items
                .iter()
                .map(|i| (i.title.as_str(), i.page))
                .collect();
            assert_eq!(
                bookmarks,
                vec![("Introduction", Some(1)), ("Methods", Some(2))]
            );
        }
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        assert!(PdfParser::from_bytes(b"not a pdf at all").is_err());
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"Plain").as_deref(), Some("Plain"));
        assert_eq!(
            decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]).as_deref(),
            Some("Hi")
        );
        assert_eq!(decode_pdf_string(&[0x43, 0xE9]).as_deref(), Some("C\u{00E9}"));
    }

    #[test]
    fn test_parse_pdf_date() {
        let date = parse_pdf_date("D:20240115103045").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_parse_pdf_date_minimal() {
        let date = parse_pdf_date("D:2024").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 1);
        assert!(parse_pdf_date("D:20").is_none());
    }
}
