//! Layout analysis for PDF pages.
//!
//! A page's content stream is interpreted into positioned text runs and
//! image placements. Runs are grouped into lines by baseline, lines into
//! blocks by spacing and style, and everything is converted to top-down
//! page coordinates for the document model.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::{BBox, Block, Line, Page, Span};
use crate::normalize::strip_subset_prefix;

/// Average glyph width as a fraction of the font size, used when the font
/// metrics are not consulted.
const GLYPH_WIDTH_RATIO: f32 = 0.5;

/// TJ adjustment (thousandths of an em) that counts as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A text run with position and style, in PDF user space (y grows upward).
#[derive(Debug, Clone)]
struct TextRun {
    text: String,
    /// Left edge
    x: f32,
    /// Baseline
    y: f32,
    width: f32,
    font_size: f32,
    font_name: String,
}

impl TextRun {
    fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let width = text.chars().count() as f32 * font_size * GLYPH_WIDTH_RATIO;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name,
        }
    }

    fn is_bold(&self) -> bool {
        let lower = self.font_name.to_lowercase();
        lower.contains("bold") || lower.contains("black") || lower.contains("heavy")
    }

    fn same_style(&self, other: &TextRun) -> bool {
        self.font_name == other.font_name && (self.font_size - other.font_size).abs() < 0.05
    }
}

/// Runs sharing one baseline, sorted left to right.
#[derive(Debug, Clone)]
struct RunLine {
    runs: Vec<TextRun>,
    /// Baseline
    y: f32,
    /// Left edge
    x: f32,
    /// Character-weighted font size
    font_size: f32,
}

impl RunLine {
    fn from_runs(mut runs: Vec<TextRun>) -> Self {
        runs.sort_by(|a, b| a.x.total_cmp(&b.x));

        let total_chars: usize = runs.iter().map(|r| r.text.len()).sum();
        let weighted: f32 = runs.iter().map(|r| r.font_size * r.text.len() as f32).sum();
        let font_size = if total_chars > 0 {
            weighted / total_chars as f32
        } else {
            runs.first().map(|r| r.font_size).unwrap_or(0.0)
        };

        let (x, y) = runs.first().map(|r| (r.x, r.y)).unwrap_or((0.0, 0.0));
        Self {
            runs,
            y,
            x,
            font_size,
        }
    }

    /// Whether most of the line's characters are set in a bold face.
    fn is_bold(&self) -> bool {
        let bold: usize = self
            .runs
            .iter()
            .filter(|r| r.is_bold())
            .map(|r| r.text.len())
            .sum();
        let total: usize = self.runs.iter().map(|r| r.text.len()).sum();
        total > 0 && bold as f32 / total as f32 > 0.5
    }

    /// Convert to a model line.
    ///
    /// Adjacent runs of one style are joined into a single span, with a space
    /// where the horizontal gap looks like a word break. Style changes start
    /// a new span.
    fn into_line(self, page_height: f32) -> Line {
        let mut spans: Vec<Span> = Vec::new();
        let mut prev: Option<&TextRun> = None;

        for run in &self.runs {
            let bbox = run_bbox(run, page_height);
            match (prev, spans.last_mut()) {
                (Some(p), Some(last)) if p.same_style(run) => {
                    if needs_space(p, run) {
                        last.text.push(' ');
                    }
                    last.text.push_str(&run.text);
                    last.bbox = last.bbox.union(&bbox);
                }
                _ => spans.push(Span::new(
                    run.text.clone(),
                    strip_subset_prefix(&run.font_name),
                    run.font_size,
                    bbox,
                )),
            }
            prev = Some(run);
        }
        Line::new(spans)
    }
}

/// Bounding box of a run in top-down page coordinates.
fn run_bbox(run: &TextRun, page_height: f32) -> BBox {
    let top = run.y + run.font_size * 0.8;
    let bottom = run.y - run.font_size * 0.2;
    BBox::new(run.x, page_height - top, run.x + run.width, page_height - bottom)
}

/// Whether a word space belongs between two runs of the same line.
fn needs_space(prev: &TextRun, curr: &TextRun) -> bool {
    let gap = curr.x - (prev.x + prev.width);
    let chars = curr.text.chars().count();
    let avg_char_width = if chars > 0 && curr.width > 0.0 {
        curr.width / chars as f32
    } else {
        curr.font_size * GLYPH_WIDTH_RATIO
    };
    if gap <= avg_char_width * 0.2 {
        return false;
    }

    let prev_last = prev.text.chars().last();
    let curr_first = curr.text.chars().next();
    let both_spaceless = prev_last.is_some_and(is_spaceless_script_char)
        && curr_first.is_some_and(is_spaceless_script_char);
    let has_space = prev_last.is_some_and(|c| c == ' ' || c == '\u{00A0}')
        || curr_first.is_some_and(|c| c == ' ' || c == '\u{00A0}');
    !both_spaceless && !has_space
}

/// An image drawn on the page, in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ImagePlacement {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl ImagePlacement {
    fn to_bbox(self, page_height: f32) -> BBox {
        BBox::new(self.x0, page_height - self.y1, self.x1, page_height - self.y0)
    }
}

/// Everything drawn by one content stream.
#[derive(Debug, Default)]
struct PageContent {
    runs: Vec<TextRun>,
    images: Vec<ImagePlacement>,
}

/// A detected column in the page layout.
#[derive(Debug, Clone)]
struct Column {
    /// Left boundary X coordinate
    left: f32,
    /// Right boundary X coordinate
    right: f32,
}

impl Column {
    fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A run belongs to a column if its left edge or its center is inside.
    fn contains_run(&self, run: &TextRun) -> bool {
        let center = run.x + run.width / 2.0;
        self.contains(run.x) || self.contains(center)
    }
}

/// Turns PDF pages into blocks of lines of spans.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
    extract_images: bool,
}

impl<'a> LayoutAnalyzer<'a> {
    /// Create a new layout analyzer.
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self {
            doc,
            extract_images: true,
        }
    }

    /// Enable or disable image blocks.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }

    /// Analyze one page into a model page with blocks in reading order.
    pub fn analyze_page(&self, page_num: u32, width: f32, height: f32) -> Result<Page> {
        let content = self.extract_page_content(page_num)?;
        Ok(self.build_page(page_num, width, height, content))
    }

    fn build_page(&self, page_num: u32, width: f32, height: f32, content: PageContent) -> Page {
        let mut page = Page::new(page_num, width, height);

        let lines = self.group_runs_into_lines(content.runs);
        for group in self.group_lines_into_blocks(lines) {
            let lines: Vec<Line> = group.into_iter().map(|l| l.into_line(height)).collect();
            page.add_block(Block::text(lines));
        }

        if self.extract_images {
            for image in content.images {
                let bbox = image.to_bbox(height);
                let at = page
                    .blocks
                    .iter()
                    .position(|b| b.bbox.y0 > bbox.y0)
                    .unwrap_or(page.blocks.len());
                page.blocks.insert(at, Block::image(bbox));
            }
        }

        log::debug!("Page {}: {} blocks", page_num, page.blocks.len());
        page
    }

    /// Interpret a page's content stream.
    fn extract_page_content(&self, page_num: u32) -> Result<PageContent> {
        let pages = self.doc.get_pages();
        let page_id = pages
            .get(&page_num)
            .ok_or(Error::PageOutOfRange(page_num, pages.len() as u32))?;

        let lopdf_fonts = self
            .doc
            .get_page_fonts(*page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut fonts = HashMap::new();
        for (name, font) in &lopdf_fonts {
            let base_font = font
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            fonts.insert(name.clone(), base_font);
        }

        let images = if self.extract_images {
            self.image_xobject_names(*page_id)
        } else {
            HashSet::new()
        };

        let content = self.get_page_content(*page_id)?;
        self.parse_content_stream(&content, &fonts, &lopdf_fonts, &images)
    }

    /// Get the page's decoded content stream.
    fn get_page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            // A page without content is blank, not broken.
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Reference(r) => {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    return Ok(s
                        .decompressed_content()
                        .unwrap_or_else(|_| s.content.clone()));
                }
                Err(Error::PdfParse("Invalid content stream".to_string()))
            }
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Reference(r) = obj {
                        if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                            if let Ok(data) = s.decompressed_content() {
                                content.extend_from_slice(&data);
                                content.push(b' ');
                            }
                        }
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    /// Names of the image XObjects in a page's resources.
    fn image_xobject_names(&self, page_id: ObjectId) -> HashSet<Vec<u8>> {
        let mut names = HashSet::new();
        let Ok(page_dict) = self.doc.get_dictionary(page_id) else {
            return names;
        };
        let Some(resources) = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| self.dereference_dict(r))
        else {
            return names;
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| self.dereference_dict(x))
        else {
            return names;
        };

        for (name, obj) in xobjects.iter() {
            let Ok(obj_ref) = obj.as_reference() else {
                continue;
            };
            if let Ok(Object::Stream(stream)) = self.doc.get_object(obj_ref) {
                let is_image = stream
                    .dict
                    .get(b"Subtype")
                    .ok()
                    .and_then(|s| s.as_name_str().ok())
                    == Some("Image");
                if is_image {
                    names.insert(name.clone());
                }
            }
        }
        names
    }

    fn dereference_dict(&self, obj: &'a Object) -> Option<&'a lopdf::Dictionary> {
        match obj {
            Object::Reference(r) => self.doc.get_dictionary(*r).ok(),
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Parse a content stream with the page's font encodings.
    fn parse_content_stream(
        &self,
        content: &[u8],
        fonts: &HashMap<Vec<u8>, String>,
        lopdf_fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
        images: &HashSet<Vec<u8>>,
    ) -> Result<PageContent> {
        let content =
            lopdf::content::Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut out = PageContent::default();
        let mut current_font = String::new();
        let mut current_font_key: Vec<u8> = Vec::new();
        let mut current_font_size: f32 = 12.0;
        let mut text = TextState::default();
        let mut ctm = Matrix::IDENTITY;
        let mut ctm_stack: Vec<Matrix> = Vec::new();
        let mut in_text_block = false;

        let decode = |key: &[u8], bytes: &[u8]| -> String {
            match lopdf_fonts.get(key).and_then(|f| f.get_font_encoding(self.doc).ok()) {
                Some(enc) => LopdfDocument::decode_text(&enc, bytes).unwrap_or_default(),
                None => decode_text_simple(bytes),
            }
        };

        for op in content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => match ctm_stack.pop() {
                    Some(saved) => ctm = saved,
                    None => log::debug!("Unbalanced Q in content stream"),
                },
                "cm" => {
                    if let Some(m) = matrix_operands(operands) {
                        ctm = m.multiply(&ctm);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        if images.contains(name) {
                            out.images.push(ctm.unit_square());
                        }
                    }
                }
                "BT" => {
                    in_text_block = true;
                    text = TextState {
                        leading: text.leading,
                        ..TextState::default()
                    };
                }
                "ET" => in_text_block = false,
                "Tf" => {
                    if operands.len() >= 2 {
                        if let Object::Name(font_key) = &operands[0] {
                            current_font_key = font_key.clone();
                            current_font = fonts
                                .get(font_key.as_slice())
                                .cloned()
                                .unwrap_or_else(|| String::from_utf8_lossy(font_key).to_string());
                        }
                        current_font_size = get_number(&operands[1]).unwrap_or(12.0);
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(get_number) {
                        text.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if operands.len() >= 2 {
                        let tx = get_number(&operands[0]).unwrap_or(0.0);
                        let ty = get_number(&operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            text.leading = -ty;
                        }
                        text.translate(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(operands) {
                        text.set(m);
                    }
                }
                "T*" => text.next_line(),
                "Tj" | "TJ" | "'" | "\"" => {
                    if matches!(op.operator.as_str(), "'" | "\"") {
                        text.next_line();
                    }
                    if !in_text_block {
                        continue;
                    }

                    let shown = match op.operator.as_str() {
                        "TJ" => match operands.first() {
                            Some(Object::Array(arr)) => {
                                decode_tj_array(arr, |b| decode(&current_font_key, b))
                            }
                            _ => String::new(),
                        },
                        "\"" => match operands.get(2) {
                            Some(Object::String(bytes, _)) => decode(&current_font_key, bytes),
                            _ => String::new(),
                        },
                        _ => match operands.first() {
                            Some(Object::String(bytes, _)) => decode(&current_font_key, bytes),
                            _ => String::new(),
                        },
                    };

                    let device = text.matrix.multiply(&ctm);
                    let size = current_font_size * device.vertical_scale();
                    let (x, y) = device.origin();
                    let advance = shown.chars().count() as f32 * current_font_size * GLYPH_WIDTH_RATIO;
                    text.advance(advance);

                    if !shown.trim().is_empty() {
                        out.runs
                            .push(TextRun::new(shown, x, y, size, current_font.clone()));
                    }
                }
                _ => {}
            }
        }

        Ok(out)
    }

    /// Group runs into lines, one column at a time.
    ///
    /// Multi-column pages are read column by column, each top to bottom.
    fn group_runs_into_lines(&self, runs: Vec<TextRun>) -> Vec<RunLine> {
        if runs.is_empty() {
            return vec![];
        }

        let columns = self.detect_columns(&runs);
        log::debug!("Detected {} columns", columns.len());
        if columns.len() <= 1 {
            return self.group_runs_into_lines_single_column(runs);
        }

        let mut column_runs: Vec<Vec<TextRun>> = vec![Vec::new(); columns.len()];
        for run in runs {
            let index = columns
                .iter()
                .position(|c| c.contains_run(&run))
                .unwrap_or(0);
            column_runs[index].push(run);
        }

        column_runs
            .into_iter()
            .flat_map(|runs| self.group_runs_into_lines_single_column(runs))
            .collect()
    }

    /// Detect columns from a vertical gutter in the run coverage.
    fn detect_columns(&self, runs: &[TextRun]) -> Vec<Column> {
        let min_x = runs.iter().map(|r| r.x).fold(f32::MAX, f32::min);
        let max_x = runs.iter().map(|r| r.x + r.width).fold(f32::MIN, f32::max);
        let single = vec![Column {
            left: min_x - 10.0,
            right: max_x + 10.0,
        }];

        let page_width = max_x - min_x;
        if runs.is_empty() || page_width < 250.0 {
            return single;
        }

        // Occupancy of 3pt vertical slices.
        let slice_width = 3.0;
        let num_slices = ((page_width / slice_width) as usize) + 1;
        let mut occupancy = vec![0usize; num_slices];
        for run in runs {
            let start = ((run.x - min_x) / slice_width) as usize;
            let end = (((run.x + run.width) - min_x) / slice_width) as usize;
            for slot in occupancy
                .iter_mut()
                .take(end.min(num_slices - 1) + 1)
                .skip(start)
            {
                *slot += 1;
            }
        }

        // Widest empty stretch in the middle 70%, preferring ones near the center.
        let search_start = num_slices * 15 / 100;
        let search_end = num_slices * 85 / 100;
        let center = num_slices / 2;
        let mut best: Option<(usize, usize)> = None;
        let mut gap_start = 0;
        let mut gap_len = 0;

        let mut consider = |start: usize, len: usize, best: &mut Option<(usize, usize)>| {
            let width = len as f32 * slice_width;
            if width < 10.0 {
                return;
            }
            let dist = |s: usize, l: usize| ((s + l / 2) as i32 - center as i32).abs();
            match *best {
                None => *best = Some((start, len)),
                Some((bs, bl)) => {
                    let best_width = bl as f32 * slice_width;
                    if width > best_width * 1.5
                        || (width >= best_width * 0.7 && dist(start, len) < dist(bs, bl))
                    {
                        *best = Some((start, len));
                    }
                }
            }
        };

        for (i, &count) in occupancy
            .iter()
            .enumerate()
            .take(search_end)
            .skip(search_start)
        {
            if count == 0 {
                if gap_len == 0 {
                    gap_start = i;
                }
                gap_len += 1;
            } else {
                if gap_len > 0 {
                    consider(gap_start, gap_len, &mut best);
                }
                gap_len = 0;
            }
        }
        if gap_len > 0 {
            consider(gap_start, gap_len, &mut best);
        }

        let Some((best_start, best_len)) = best else {
            return single;
        };
        if (best_len as f32 * slice_width) < 12.0 {
            return single;
        }

        let gutter = min_x + (best_start as f32 + best_len as f32 / 2.0) * slice_width;
        if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
            log::debug!("Column too narrow, treating as single column");
            return single;
        }

        // Both sides need at least 10% of the runs.
        let left = runs.iter().filter(|r| r.x + r.width / 2.0 < gutter).count();
        let right = runs.len() - left;
        let min_runs = (runs.len() / 10).max(2);
        if left < min_runs || right < min_runs {
            log::debug!("Runs too imbalanced, treating as single column");
            return single;
        }

        vec![
            Column {
                left: min_x - 10.0,
                right: gutter,
            },
            Column {
                left: gutter,
                right: max_x + 10.0,
            },
        ]
    }

    /// Baseline grouping within one column.
    fn group_runs_into_lines_single_column(&self, mut runs: Vec<TextRun>) -> Vec<RunLine> {
        // PDF y grows upward: sort top to bottom, then left to right.
        runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut lines = Vec::new();
        let mut current: Vec<TextRun> = Vec::new();
        let mut current_y: Option<f32> = None;

        for run in runs {
            let tolerance = run.font_size * 0.3;
            match current_y {
                Some(y) if (run.y - y).abs() <= tolerance => current.push(run),
                _ => {
                    if !current.is_empty() {
                        lines.push(RunLine::from_runs(std::mem::take(&mut current)));
                    }
                    current_y = Some(run.y);
                    current.push(run);
                }
            }
        }
        if !current.is_empty() {
            lines.push(RunLine::from_runs(current));
        }
        lines
    }

    /// Group lines into blocks (paragraphs, headings) based on spacing.
    fn group_lines_into_blocks(&self, lines: Vec<RunLine>) -> Vec<Vec<RunLine>> {
        let avg_spacing = average_line_spacing(&lines);
        let mut blocks: Vec<Vec<RunLine>> = Vec::new();
        let mut current: Vec<RunLine> = Vec::new();

        for line in lines {
            let breaks = current
                .last()
                .is_some_and(|prev| should_break_block(prev, &line, avg_spacing));
            if breaks {
                blocks.push(std::mem::take(&mut current));
            }
            current.push(line);
        }
        if !current.is_empty() {
            blocks.push(current);
        }
        blocks
    }
}

fn average_line_spacing(lines: &[RunLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[0].y - w[1].y).abs())
        .filter(|s| *s > 0.1)
        .collect();
    if spacings.is_empty() {
        return 12.0;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

/// Whether `curr` starts a new block after `prev`.
fn should_break_block(prev: &RunLine, curr: &RunLine, avg_spacing: f32) -> bool {
    let spacing = (prev.y - curr.y).abs();
    // Column changes jump back up the page.
    curr.y > prev.y + prev.font_size
        || spacing > avg_spacing * 1.5
        || (prev.font_size - curr.font_size).abs() > 1.0
        || prev.is_bold() != curr.is_bold()
        || (prev.x - curr.x).abs() > 20.0
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`: apply `self`, then `other`.
    fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn origin(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Bounds of the unit square, where image XObjects are drawn.
    fn unit_square(&self) -> ImagePlacement {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        ImagePlacement {
            x0: xs.clone().fold(f32::MAX, f32::min),
            x1: xs.fold(f32::MIN, f32::max),
            y0: ys.clone().fold(f32::MAX, f32::min),
            y1: ys.fold(f32::MIN, f32::max),
        }
    }
}

/// Text and text-line matrices plus leading.
#[derive(Debug, Clone)]
struct TextState {
    matrix: Matrix,
    line: Matrix,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line: Matrix::IDENTITY,
            leading: 12.0,
        }
    }
}

impl TextState {
    fn set(&mut self, m: Matrix) {
        self.matrix = m;
        self.line = m;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.line = Matrix::translation(tx, ty).multiply(&self.line);
        self.matrix = self.line;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    /// Move past shown text, in unscaled text space units.
    fn advance(&mut self, tx: f32) {
        self.matrix = Matrix::translation(tx, 0.0).multiply(&self.matrix);
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let n: Vec<f32> = operands[..6].iter().map(get_number).collect::<Option<_>>()?;
    Some(Matrix {
        a: n[0],
        b: n[1],
        c: n[2],
        d: n[3],
        e: n[4],
        f: n[5],
    })
}

/// Decode a TJ array, turning large negative adjustments into word spaces.
fn decode_tj_array(arr: &[Object], decode: impl Fn(&[u8]) -> String) -> String {
    let mut combined = String::new();
    for item in arr {
        match item {
            Object::String(bytes, _) => combined.push_str(&decode(bytes)),
            Object::Integer(_) | Object::Real(_) => {
                let adjustment = -get_number(item).unwrap_or(0.0);
                let ends_with_space = combined.ends_with(' ') || combined.ends_with('\u{00A0}');
                let spaceless = combined.chars().last().is_some_and(is_spaceless_script_char);
                if adjustment > TJ_SPACE_THRESHOLD
                    && !combined.is_empty()
                    && !ends_with_space
                    && !spaceless
                {
                    combined.push(' ');
                }
            }
            _ => {}
        }
    }
    combined
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Scripts written without spaces between words (Chinese, Japanese).
/// Hangul is not included: Korean uses word spaces.
fn is_spaceless_script_char(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F
        | 0x2B820..=0x2CEAF
        | 0x2CEB0..=0x2EBEF
        | 0x3040..=0x309F
        | 0x30A0..=0x30FF
        | 0x3000..=0x303F)
}

/// Fallback decoding when the font has no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32, size: f32, font: &str) -> TextRun {
        TextRun::new(text.to_string(), x, y, size, font.to_string())
    }

    fn parse(content: &str) -> PageContent {
        let doc = LopdfDocument::with_version("1.5");
        let analyzer = LayoutAnalyzer::new(&doc);
        let images: HashSet<Vec<u8>> = [b"Im1".to_vec()].into_iter().collect();
        analyzer
            .parse_content_stream(content.as_bytes(), &HashMap::new(), &BTreeMap::new(), &images)
            .unwrap()
    }

    #[test]
    fn test_content_stream_positions() {
        let content = parse(
            "BT /F1 12 Tf 72 700 Td (Hello) Tj 0 -14 Td (World) Tj ET \
             BT /F1 10 Tf 1 0 0 1 300 100 Tm [(Ke) -20 (rn) -250 (ing)] TJ ET",
        );
        let texts: Vec<_> = content.runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "World", "Kern ing"]);
        assert_eq!((content.runs[0].x, content.runs[0].y), (72.0, 700.0));
        assert_eq!((content.runs[1].x, content.runs[1].y), (72.0, 686.0));
        assert_eq!(content.runs[2].font_size, 10.0);
        assert_eq!(content.runs[0].font_name, "F1");
    }

    #[test]
    fn test_graphics_state_scales_text_and_places_images() {
        let content = parse(
            "q 2 0 0 2 0 0 cm BT /F1 6 Tf 10 20 Td (Big) Tj ET Q \
             BT /F1 6 Tf 10 20 Td (Small) Tj ET \
             q 200 0 0 100 50 300 cm /Im1 Do Q /Other Do",
        );
        assert_eq!(content.runs[0].font_size, 12.0);
        assert_eq!((content.runs[0].x, content.runs[0].y), (20.0, 40.0));
        assert_eq!(content.runs[1].font_size, 6.0);
        assert_eq!(
            content.images,
            vec![ImagePlacement {
                x0: 50.0,
                y0: 300.0,
                x1: 250.0,
                y1: 400.0
            }]
        );
    }

    #[test]
    fn test_t_star_uses_leading() {
        let content = parse("BT /F1 10 Tf 16 TL 50 500 Td (One) Tj T* (Two) Tj (Three) ' ET");
        let ys: Vec<_> = content.runs.iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![500.0, 484.0, 468.0]);
    }

    #[test]
    fn test_lines_and_blocks() {
        let doc = LopdfDocument::with_version("1.5");
        let analyzer = LayoutAnalyzer::new(&doc);
        let runs = vec![
            run("Methods", 72.0, 700.0, 14.0, "ABCDEF+Times-Bold"),
            run("We", 72.0, 670.0, 10.0, "Times"),
            run("measured.", 90.0, 670.0, 10.0, "Times"),
            run("Then we", 72.0, 658.0, 10.0, "Times"),
            run("stopped.", 72.0, 646.0, 10.0, "Times"),
        ];
        let content = PageContent {
            runs,
            images: vec![ImagePlacement {
                x0: 72.0,
                y0: 400.0,
                x1: 300.0,
                y1: 600.0,
            }],
        };
        let page = analyzer.build_page(1, 612.0, 792.0, content);

        assert_eq!(page.blocks.len(), 3);
        assert_eq!(page.blocks[0].plain_text(), "Methods");
        assert_eq!(page.blocks[0].lines[0].spans[0].font, "Times-Bold");
        assert!(page.blocks[0].lines[0].spans[0].flags.is_bold());
        assert_eq!(page.blocks[1].lines.len(), 3);
        assert_eq!(page.blocks[1].lines[0].spans[0].text, "We measured.");
        assert!(page.blocks[2].is_image());
        assert_eq!(page.blocks[2].bbox.y0, 192.0);

        // Top-down coordinates: the heading sits above the body.
        assert!(page.blocks[0].bbox.y1 < page.blocks[1].bbox.y0);
        assert!((page.blocks[0].bbox.y0 - (792.0 - 700.0 - 14.0 * 0.8)).abs() < 0.01);
    }

    #[test]
    fn test_two_columns_read_in_order() {
        let doc = LopdfDocument::with_version("1.5");
        let analyzer = LayoutAnalyzer::new(&doc);
        let mut runs = Vec::new();
        for i in 0..5 {
            let y = 700.0 - i as f32 * 12.0;
            runs.push(run("left column text", 72.0, y, 10.0, "Times"));
            runs.push(run("right column text", 330.0, y, 10.0, "Times"));
        }
        let lines = analyzer.group_runs_into_lines(runs);
        assert_eq!(lines.len(), 10);
        assert!(lines[..5].iter().all(|l| l.x == 72.0));
        assert!(lines[5..].iter().all(|l| l.x == 330.0));

        let blocks = analyzer.group_lines_into_blocks(lines);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_column_contains_run() {
        let col = Column {
            left: 100.0,
            right: 200.0,
        };
        assert!(col.contains(100.0));
        assert!(!col.contains(201.0));
        assert!(col.contains_run(&run("Test", 120.0, 0.0, 12.0, "Helvetica")));
        // 4 chars * 6pt: center at 102
        assert!(col.contains_run(&run("Test", 90.0, 0.0, 12.0, "Helvetica")));
        assert!(!col.contains_run(&run("Test", 250.0, 0.0, 12.0, "Helvetica")));
    }

    #[test]
    fn test_same_style_runs_join() {
        let line = RunLine::from_runs(vec![
            run("Hel", 72.0, 700.0, 10.0, "Times"),
            run("lo", 87.0, 700.0, 10.0, "Times"),
            run("world", 120.0, 700.0, 10.0, "Times"),
            run("CODE", 160.0, 700.0, 10.0, "Courier"),
        ]);
        let line = line.into_line(792.0);
        let texts: Vec<_> = line.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello world", "CODE"]);
    }

    #[test]
    fn test_decode_text_simple() {
        assert_eq!(decode_text_simple(b"plain"), "plain");
        assert_eq!(decode_text_simple(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]), "AB");
        assert_eq!(decode_text_simple(&[0xE9]), "\u{00E9}");
    }
}
