//! EPUB document parser using zip and roxmltree.
//!
//! Every spine item becomes one page. XHTML content is flattened into
//! blocks with synthetic typography (headings set large and bold, body in a
//! regular serif), so the typographic heuristics work on EPUB the same way
//! they work on PDF.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use roxmltree::{Node, ParsingOptions};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::model::{
    BBox, Block, Document, Layout, Line, Metadata, Outline, OutlineItem, Page, Span, StyleFlags,
};

use super::options::ParseOptions;

const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";

/// Width of the synthetic page.
const PAGE_WIDTH: f32 = 600.0;
/// Vertical distance between consecutive blocks.
const BLOCK_STEP: f32 = 20.0;

pub const BODY_FONT: &str = "serif";
pub const BODY_SIZE: f32 = 12.0;
const BOLD_FONT: &str = "serif-bold";
const ITALIC_FONT: &str = "serif-italic";
const MONO_FONT: &str = "monospace";
const CAPTION_FONT: &str = "caption";
const CAPTION_SIZE: f32 = 10.0;

/// Font size for a heading element.
fn heading_size(level: u8) -> f32 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 18.0,
        4 => 16.0,
        5 => 14.0,
        _ => 13.0,
    }
}

/// EPUB document parser.
pub struct EpubParser {
    data: Vec<u8>,
    options: ParseOptions,
}

/// A manifest entry.
#[derive(Debug, Clone)]
struct ManifestItem {
    href: String,
    media_type: String,
    properties: String,
}

/// What the package document says about the book.
#[derive(Debug, Default)]
struct Package {
    version: String,
    metadata: Metadata,
    /// Archive paths of the spine items, in reading order
    spine: Vec<String>,
    /// Archive path of the EPUB 3 navigation document
    nav: Option<String>,
    /// Archive path of the EPUB 2 NCX
    ncx: Option<String>,
}

impl EpubParser {
    /// Open an EPUB file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open an EPUB file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes_with_options(data, options)
    }

    /// Parse an EPUB from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Parse an EPUB from bytes with custom options.
    pub fn from_bytes_with_options(data: Vec<u8>, options: ParseOptions) -> Result<Self> {
        // Fail early on anything that is not a zip archive.
        ZipArchive::new(Cursor::new(data.as_slice()))?;
        Ok(Self { data, options })
    }

    /// Parse the book into one page per spine item.
    pub fn parse(&self) -> Result<Document> {
        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))?;

        let opf_path = find_package_path(&read_entry(&mut archive, "META-INF/container.xml")?)?;
        let package = parse_package(&read_entry(&mut archive, &opf_path)?, &opf_path)?;

        let mut document = Document::new(Layout::Reflowable);
        document.metadata = package.metadata.clone();
        document.metadata.format = format!("EPUB {}", package.version);
        document.metadata.page_count = package.spine.len() as u32;

        for (index, path) in package.spine.iter().enumerate() {
            let number = index as u32 + 1;
            let page = read_entry(&mut archive, path).and_then(|xhtml| xhtml_to_page(&xhtml, number));
            let page = match page {
                Ok(page) => page,
                Err(e) if self.options.is_lenient() => {
                    log::warn!("Failed to read spine item {}: {}", path, e);
                    Page::new(number, PAGE_WIDTH, BLOCK_STEP)
                }
                Err(e) => return Err(e),
            };
            document.add_page(page);
        }

        let outline = match (&package.nav, &package.ncx) {
            (Some(nav), _) => read_entry(&mut archive, nav)
                .and_then(|xhtml| parse_nav(&xhtml, nav, &package.spine)),
            (None, Some(ncx)) => read_entry(&mut archive, ncx)
                .and_then(|xml| parse_ncx(&xml, ncx, &package.spine)),
            (None, None) => Ok(Outline::new()),
        };
        match outline {
            Ok(outline) if !outline.is_empty() => document.outline = Some(outline),
            Ok(_) => log::debug!("EPUB has no navigation entries"),
            Err(e) => log::warn!("Failed to read EPUB navigation: {}", e),
        }

        Ok(document)
    }
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::Epub(format!("missing archive entry {}", name)))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_xml(text: &str) -> Result<roxmltree::Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(text, options)?)
}

/// `full-path` of the first rootfile in `container.xml`.
fn find_package_path(container: &str) -> Result<String> {
    let doc = parse_xml(container)?;
    doc.descendants()
        .find(|n| n.has_tag_name("rootfile"))
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_string)
        .ok_or_else(|| Error::Epub("container.xml names no package document".to_string()))
}

fn parse_package(opf: &str, opf_path: &str) -> Result<Package> {
    let doc = parse_xml(opf)?;
    let root = doc.root_element();
    let base = parent_dir(opf_path);

    let mut package = Package {
        version: root.attribute("version").unwrap_or("2.0").to_string(),
        ..Package::default()
    };

    let dc_text = |name: &str| {
        doc.descendants()
            .find(|n| n.has_tag_name((DC_NS, name)))
            .map(node_text)
            .filter(|t| !t.is_empty())
    };
    package.metadata.title = dc_text("title");
    package.metadata.author = dc_text("creator");
    package.metadata.subject = dc_text("subject");
    package.metadata.created = dc_text("date").and_then(|d| parse_epub_date(&d));

    let mut manifest: HashMap<&str, ManifestItem> = HashMap::new();
    for item in doc.descendants().filter(|n| n.tag_name().name() == "item") {
        let (Some(id), Some(href)) = (item.attribute("id"), item.attribute("href")) else {
            continue;
        };
        manifest.insert(
            id,
            ManifestItem {
                href: resolve_href(&base, href),
                media_type: item.attribute("media-type").unwrap_or_default().to_string(),
                properties: item.attribute("properties").unwrap_or_default().to_string(),
            },
        );
    }

    let spine = doc
        .descendants()
        .find(|n| n.tag_name().name() == "spine")
        .ok_or_else(|| Error::Epub("package has no spine".to_string()))?;
    for itemref in spine.children().filter(|n| n.tag_name().name() == "itemref") {
        match itemref.attribute("idref").and_then(|id| manifest.get(id)) {
            Some(item) => package.spine.push(item.href.clone()),
            None => log::warn!("Spine item {:?} is not in the manifest", itemref.attribute("idref")),
        }
    }

    package.nav = manifest
        .values()
        .find(|item| item.properties.split_whitespace().any(|p| p == "nav"))
        .map(|item| item.href.clone());
    package.ncx = spine
        .attribute("toc")
        .and_then(|id| manifest.get(id))
        .or_else(|| {
            manifest
                .values()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
        })
        .map(|item| item.href.clone());

    Ok(package)
}

/// EPUB 3 navigation: the `toc` nav element's nested lists.
fn parse_nav(xhtml: &str, nav_path: &str, spine: &[String]) -> Result<Outline> {
    let text = replace_html_entities(xhtml);
    let doc = parse_xml(&text)?;
    let base = parent_dir(nav_path);

    let navs: Vec<Node> = doc.descendants().filter(|n| n.tag_name().name() == "nav").collect();
    let toc = navs
        .iter()
        .find(|n| n.attribute((OPS_NS, "type")).is_some_and(|t| t.contains("toc")))
        .or_else(|| navs.first());

    let mut outline = Outline::new();
    if let Some(list) = toc.and_then(|nav| nav.descendants().find(|n| n.tag_name().name() == "ol")) {
        outline.items = nav_list_items(list, &base, spine);
    }
    Ok(outline)
}

fn nav_list_items(list: Node, base: &str, spine: &[String]) -> Vec<OutlineItem> {
    let mut items = Vec::new();
    for li in list.children().filter(|n| n.tag_name().name() == "li") {
        let label = li
            .children()
            .find(|n| matches!(n.tag_name().name(), "a" | "span"));
        let title = label.map(node_text).unwrap_or_default();
        let page = label
            .and_then(|a| a.attribute("href"))
            .and_then(|href| spine_page(base, href, spine));

        let mut item = OutlineItem::new(title, page);
        if let Some(sublist) = li.children().find(|n| n.tag_name().name() == "ol") {
            item.children = nav_list_items(sublist, base, spine);
        }
        items.push(item);
    }
    items
}

/// EPUB 2 navigation: nested `navPoint` elements.
fn parse_ncx(xml: &str, ncx_path: &str, spine: &[String]) -> Result<Outline> {
    let doc = parse_xml(xml)?;
    let base = parent_dir(ncx_path);

    let mut outline = Outline::new();
    if let Some(nav_map) = doc.descendants().find(|n| n.tag_name().name() == "navMap") {
        outline.items = nav_points(nav_map, &base, spine);
    }
    Ok(outline)
}

fn nav_points(parent: Node, base: &str, spine: &[String]) -> Vec<OutlineItem> {
    parent
        .children()
        .filter(|n| n.tag_name().name() == "navPoint")
        .map(|point| {
            let title = point
                .children()
                .find(|n| n.tag_name().name() == "navLabel")
                .map(node_text)
                .unwrap_or_default();
            let page = point
                .children()
                .find(|n| n.tag_name().name() == "content")
                .and_then(|c| c.attribute("src"))
                .and_then(|src| spine_page(base, src, spine));

            let mut item = OutlineItem::new(title, page);
            item.children = nav_points(point, base, spine);
            item
        })
        .collect()
}

/// 1-based spine position of the document an href points into.
fn spine_page(base: &str, href: &str, spine: &[String]) -> Option<u32> {
    let path = resolve_href(base, href);
    spine
        .iter()
        .position(|item| *item == path)
        .map(|i| i as u32 + 1)
}

/// Style of the block element currently being flattened.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockStyle {
    Body,
    Heading(u8),
    Caption,
    Preformatted,
}

/// Inline style of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
    mono: bool,
    superscript: bool,
}

/// Walks an XHTML body and emits blocks in document order.
struct Flattener {
    blocks: Vec<Block>,
    runs: Vec<(String, RunStyle)>,
    block_style: BlockStyle,
}

impl Flattener {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            runs: Vec::new(),
            block_style: BlockStyle::Body,
        }
    }

    fn walk(&mut self, node: Node, style: RunStyle) {
        for child in node.children() {
            if child.is_text() {
                if let Some(text) = child.text() {
                    self.runs.push((text.to_string(), style));
                }
                continue;
            }
            if !child.is_element() {
                continue;
            }

            let tag = child.tag_name().name().to_ascii_lowercase();
            match tag.as_str() {
                "script" | "style" | "head" | "title" => {}
                "img" | "svg" | "image" | "video" => {
                    self.flush();
                    let y = self.next_y();
                    self.blocks
                        .push(Block::image(BBox::new(0.0, y, PAGE_WIDTH, y + BLOCK_STEP)));
                }
                "br" => self.runs.push(("\n".to_string(), style)),
                "b" | "strong" => self.walk(child, RunStyle { bold: true, ..style }),
                "i" | "em" | "cite" => self.walk(child, RunStyle { italic: true, ..style }),
                "code" | "kbd" | "samp" | "tt" => self.walk(child, RunStyle { mono: true, ..style }),
                "sup" => self.walk(child, RunStyle { superscript: true, ..style }),
                _ => match block_style_for(&tag) {
                    Some(block_style) => {
                        self.flush();
                        let outer = std::mem::replace(&mut self.block_style, block_style);
                        self.walk(child, style);
                        self.flush();
                        self.block_style = outer;
                    }
                    None => self.walk(child, style),
                },
            }
        }
    }

    fn next_y(&self) -> f32 {
        self.blocks.len() as f32 * BLOCK_STEP
    }

    /// Turn pending runs into a block.
    fn flush(&mut self) {
        let runs = std::mem::take(&mut self.runs);
        let y = self.next_y();
        let bbox = BBox::new(0.0, y, PAGE_WIDTH, y + BLOCK_STEP * 0.8);

        let lines: Vec<Line> = match self.block_style {
            BlockStyle::Preformatted => {
                let text: String = runs.iter().map(|(t, _)| t.as_str()).collect();
                text.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| Line::new(vec![Span::new(l.trim_end(), MONO_FONT, BODY_SIZE, bbox)]))
                    .collect()
            }
            block_style => {
                let spans = inline_spans(&runs, block_style, bbox);
                if spans.is_empty() {
                    vec![]
                } else {
                    vec![Line::new(spans)]
                }
            }
        };
        if lines.is_empty() {
            return;
        }

        let mut block = Block::text(lines);
        if let BlockStyle::Heading(level) = self.block_style {
            block = block.with_markup_level(level);
        }
        self.blocks.push(block);
    }
}

/// Block-level elements and the style their text is set in.
fn block_style_for(tag: &str) -> Option<BlockStyle> {
    Some(match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            BlockStyle::Heading(tag[1..].parse().unwrap_or(6))
        }
        "figcaption" | "caption" => BlockStyle::Caption,
        "pre" => BlockStyle::Preformatted,
        "p" | "div" | "section" | "article" | "aside" | "header" | "footer" | "li" | "ul"
        | "ol" | "dl" | "dt" | "dd" | "blockquote" | "figure" | "table" | "tr" | "td" | "th"
        | "body" | "nav" | "main" | "hr" => BlockStyle::Body,
        _ => return None,
    })
}

/// Spans for one block: same-style runs merged, whitespace collapsed.
fn inline_spans(runs: &[(String, RunStyle)], block_style: BlockStyle, bbox: BBox) -> Vec<Span> {
    let mut merged: Vec<(String, RunStyle)> = Vec::new();
    for (text, style) in runs {
        let text = collapse_whitespace(text);
        match merged.last_mut() {
            Some((last, last_style)) if last_style == style => last.push_str(&text),
            _ => merged.push((text, *style)),
        }
    }

    // Block edges never carry whitespace.
    if let Some((first, _)) = merged.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some((last, _)) = merged.last_mut() {
        *last = last.trim_end().to_string();
    }

    merged
        .into_iter()
        .filter(|(text, _)| !text.trim().is_empty())
        .map(|(text, style)| {
            let (font, size) = match block_style {
                BlockStyle::Heading(level) => (BOLD_FONT, heading_size(level)),
                BlockStyle::Caption => (CAPTION_FONT, CAPTION_SIZE),
                _ if style.mono => (MONO_FONT, BODY_SIZE),
                _ if style.bold => (BOLD_FONT, BODY_SIZE),
                _ if style.italic => (ITALIC_FONT, BODY_SIZE),
                _ => (BODY_FONT, BODY_SIZE),
            };
            let span = Span::new(text, font, size, bbox);
            if style.superscript {
                let flags = span.flags | StyleFlags::SUPERSCRIPT;
                span.with_flags(flags)
            } else {
                span
            }
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{00A0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Flatten one XHTML content document into a page.
fn xhtml_to_page(xhtml: &str, number: u32) -> Result<Page> {
    let text = replace_html_entities(xhtml);
    let doc = parse_xml(&text)?;

    let body = doc
        .descendants()
        .find(|n| n.tag_name().name() == "body")
        .unwrap_or_else(|| doc.root_element());

    let mut flattener = Flattener::new();
    flattener.walk(body, RunStyle::default());
    flattener.flush();

    let height = (flattener.blocks.len() as f32 + 1.0) * BLOCK_STEP;
    let mut page = Page::new(number, PAGE_WIDTH, height);
    for block in flattener.blocks {
        page.add_block(block);
    }
    Ok(page)
}

/// Concatenated, whitespace-normalized text of a node.
fn node_text(node: Node) -> String {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrite HTML named entities as numeric references so the XML parser
/// accepts XHTML written without a DTD.
fn replace_html_entities(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", "&#160;"),
        ("&shy;", "&#173;"),
        ("&copy;", "&#169;"),
        ("&reg;", "&#174;"),
        ("&deg;", "&#176;"),
        ("&middot;", "&#183;"),
        ("&eacute;", "&#233;"),
        ("&egrave;", "&#232;"),
        ("&uuml;", "&#252;"),
        ("&ouml;", "&#246;"),
        ("&auml;", "&#228;"),
        ("&ndash;", "&#8211;"),
        ("&mdash;", "&#8212;"),
        ("&lsquo;", "&#8216;"),
        ("&rsquo;", "&#8217;"),
        ("&ldquo;", "&#8220;"),
        ("&rdquo;", "&#8221;"),
        ("&bull;", "&#8226;"),
        ("&hellip;", "&#8230;"),
        ("&thinsp;", "&#8201;"),
        ("&times;", "&#215;"),
    ];
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (name, numeric)| acc.replace(name, numeric))
}

/// Directory part of an archive path, with a trailing slash.
fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[..=i].to_string(),
        None => String::new(),
    }
}

/// Resolve an href against a base directory inside the archive.
/// Fragments are dropped and `.`/`..` segments folded.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = percent_decode(href);
    let joined = if href.starts_with('/') {
        href.trim_start_matches('/').to_string()
    } else {
        format!("{}{}", base, href)
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_epub_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            let year: i32 = s.get(0..4)?.parse().ok()?;
            chrono::NaiveDate::from_ymd_opt(year, 1, 1)
        })?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
