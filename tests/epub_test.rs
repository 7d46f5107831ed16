//! End-to-end tests over EPUB files written to a temporary directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use sectify::{
    detect_format_from_path, open_document, DocumentFormat, Layout, OutlineSource, Sectify,
};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const OPF_EPUB3: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title>Harbour Tales</dc:title>
    <dc:creator>J. Writer</dc:creator>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="toc">
    <ol>
      <li><a href="text/ch1.xhtml">Chapter One</a>
        <ol><li><a href="text/ch1.xhtml#harbour">The Harbour</a></li></ol>
      </li>
      <li><a href="text/ch2.xhtml">Chapter Two</a></li>
    </ol>
  </nav>
</body>
</html>"#;

const CHAPTER_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter One</title></head>
<body>
  <h1>Chapter One</h1>
  <p>The boats came in at dawn.</p>
  <p>Nobody was awake to see them.</p>
  <h2 id="harbour">The Harbour</h2>
  <p>Gulls circled the empty quay.</p>
  <p>A bell rang &amp; then stopped.</p>
</body>
</html>"#;

const CHAPTER_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
  <h1>Chapter Two</h1>
  <p>By noon the market was full.</p>
  <p>Fish sold out before one.</p>
</body>
</html>"#;

/// Write an EPUB with `mimetype` stored first, as the format requires.
fn write_epub(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);

    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (entry, content) in files {
        zip.start_file(*entry, deflated).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn harbour_tales(dir: &Path) -> PathBuf {
    write_epub(
        dir,
        "harbour.epub",
        &[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF_EPUB3),
            ("OEBPS/nav.xhtml", NAV),
            ("OEBPS/text/ch1.xhtml", CHAPTER_ONE),
            ("OEBPS/text/ch2.xhtml", CHAPTER_TWO),
        ],
    )
}

#[test]
fn test_detect_epub() {
    let dir = tempfile::tempdir().unwrap();
    let path = harbour_tales(dir.path());
    assert_eq!(detect_format_from_path(&path).unwrap(), DocumentFormat::Epub);
    assert!(sectify::is_supported(&path));
}

#[test]
fn test_open_epub_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = open_document(harbour_tales(dir.path())).unwrap();

    assert_eq!(doc.layout, Layout::Reflowable);
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.metadata.title.as_deref(), Some("Harbour Tales"));
    assert_eq!(doc.metadata.author.as_deref(), Some("J. Writer"));
    assert_eq!(doc.metadata.format, "EPUB 3.0");

    let first = doc.page(1).unwrap();
    assert_eq!(first.blocks[0].markup_level, Some(1));
    assert_eq!(first.blocks[4].plain_text(), "A bell rang & then stopped.");

    let outline = doc.outline.as_ref().unwrap();
    assert_eq!(outline.items.len(), 2);
    assert_eq!(outline.items[0].children[0].title, "The Harbour");
    assert_eq!(outline.items[1].page, Some(2));
}

#[test]
fn test_epub_sections() {
    let dir = tempfile::tempdir().unwrap();
    let result = Sectify::new().open(harbour_tales(dir.path())).unwrap();

    assert_eq!(result.outline.source, OutlineSource::Navigation);
    let ranges: Vec<_> = result
        .entries()
        .iter()
        .map(|e| (e.level, e.title.as_str(), e.start_page, e.end_page))
        .collect();
    assert_eq!(
        ranges,
        vec![
            (1, "Chapter One", 1, 2),
            (2, "The Harbour", 1, 2),
            (1, "Chapter Two", 2, 2),
        ]
    );

    let extracted = result.extract_all();
    let json = serde_json::to_value(&extracted.sections).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "Chapter One": {
                "_text": "The boats came in at dawn. Nobody was awake to see them.",
                "The Harbour": "Gulls circled the empty quay. A bell rang & then stopped."
            },
            "Chapter Two": "By noon the market was full. Fish sold out before one."
        })
    );
    assert!(extracted.diagnostics.is_empty());
}

#[test]
fn test_epub2_ncx_navigation() {
    let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Old Book</dc:title></metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx"><itemref idref="c1"/></spine>
</package>"#;
    let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Chapter Two</text></navLabel>
      <content src="ch1.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    let dir = tempfile::tempdir().unwrap();
    let path = write_epub(
        dir.path(),
        "old.epub",
        &[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf),
            ("OEBPS/toc.ncx", ncx),
            ("OEBPS/ch1.xhtml", CHAPTER_TWO),
        ],
    );

    let result = Sectify::new().open(&path).unwrap();
    assert_eq!(result.metadata().format, "EPUB 2.0");
    assert_eq!(result.outline.source, OutlineSource::Navigation);

    let extracted = result.extract_all();
    assert_eq!(
        extracted.sections.get("Chapter Two").unwrap().text(),
        "By noon the market was full. Fish sold out before one."
    );
}

#[test]
fn test_epub_without_navigation_uses_headings() {
    let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Bare</dc:title></metadata>
  <manifest>
    <item id="c1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#;

    let dir = tempfile::tempdir().unwrap();
    let path = write_epub(
        dir.path(),
        "bare.epub",
        &[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf),
            ("OEBPS/text/ch1.xhtml", CHAPTER_ONE),
            ("OEBPS/text/ch2.xhtml", CHAPTER_TWO),
        ],
    );

    let result = Sectify::new().open(&path).unwrap();
    assert_eq!(result.outline.source, OutlineSource::Markup);
    let titles: Vec<_> = result.entries().iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Chapter One", "The Harbour", "Chapter Two"]);
    assert_eq!(result.entries()[1].level, 2);
}

#[test]
fn test_broken_spine_item_in_lenient_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_epub(
        dir.path(),
        "broken.epub",
        &[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF_EPUB3),
            ("OEBPS/nav.xhtml", NAV),
            ("OEBPS/text/ch1.xhtml", CHAPTER_ONE),
            ("OEBPS/text/ch2.xhtml", "<html><body><p>unclosed"),
        ],
    );

    assert!(Sectify::new().open(&path).is_err());

    let result = Sectify::new().lenient().open(&path).unwrap();
    assert_eq!(result.document.page_count(), 2);
    assert!(result.document.page(2).unwrap().blocks.is_empty());
}
