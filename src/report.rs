//! PDF export of the skills map and section summary.
//!
//! Pages are A4 landscape. The grid pages come first, one page per chunk of
//! columns (and per chunk of rows when a column is too tall even at the
//! minimum row height), then the summary table.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use thiserror::Error;
use tracing::{instrument, warn};
use ttf_parser::{Face, FaceParsingError, GlyphId, name_id};

use crate::progress::SectionProgress;
use crate::skills_map::{MapCell, SkillLevel, SkillsMap};

pub const PAGE_WIDTH: f32 = 841.89;
pub const PAGE_HEIGHT: f32 = 595.28;
pub const MARGIN: f32 = 36.0;

pub const COLUMN_WIDTH: f32 = 44.0;
pub const MAX_ROW_HEIGHT: f32 = 16.0;
pub const MIN_ROW_HEIGHT: f32 = 7.0;
const TITLE_BAND: f32 = 36.0;
const COLUMN_HEADER: f32 = 16.0;
const LEGEND_BAND: f32 = 28.0;
const FOOTER_BAND: f32 = 14.0;

const SUMMARY_ROW_HEIGHT: f32 = 18.0;
const SUMMARY_COLUMNS: [(&str, f32); 6] = [
    ("Section", 330.0),
    ("Mastered", 80.0),
    ("Scored", 80.0),
    ("Total", 80.0),
    ("Completion %", 100.0),
    ("Score %", 100.0),
];

pub const SECTION_TEXT_BUDGET: usize = 48;
pub const TITLE_TEXT_BUDGET: usize = 60;
pub const SUBTITLE_TEXT_BUDGET: usize = 150;
const ELLIPSIS: &str = "...";

const BFCHAR_BLOCK: usize = 100;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown report font: {0}")]
    UnknownFont(String),

    #[error("Cannot read font file {path}: {reason}")]
    FontFile { path: String, reason: String },

    #[error("Invalid font data: {0}")]
    FontData(#[from] FaceParsingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outlines {
    TrueType,
    Cff,
}

/// A TrueType or OpenType file embedded whole into the PDF.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedFont {
    pub name: String,
    outlines: Outlines,
    data: Vec<u8>,
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("outlines", &self.outlines)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl EmbeddedFont {
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let data = std::fs::read(path).map_err(|e| ReportError::FontFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("EmbeddedFont");
        Self::from_bytes(data, stem)
    }

    pub fn from_bytes(data: Vec<u8>, fallback_name: &str) -> Result<Self, ReportError> {
        let face = Face::parse(&data, 0)?;
        let postscript = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string());
        let name = pdf_font_name(postscript.as_deref().unwrap_or(fallback_name));
        let outlines = if face.tables().cff.is_some() {
            Outlines::Cff
        } else {
            Outlines::TrueType
        };

        Ok(Self {
            name,
            outlines,
            data,
        })
    }

    fn face(&self) -> Result<Face<'_>, ReportError> {
        Ok(Face::parse(&self.data, 0)?)
    }
}

fn pdf_font_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontFace {
    /// One of the PDF base-14 fonts, WinAnsi encoded.
    Base(&'static str),
    Embedded(Arc<EmbeddedFont>),
}

/// Typeface pair used for report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFonts {
    pub regular: FontFace,
    pub bold: FontFace,
}

const FONT_FAMILIES: [(&str, &str, &str); 3] = [
    ("helvetica", "Helvetica", "Helvetica-Bold"),
    ("times", "Times-Roman", "Times-Bold"),
    ("courier", "Courier", "Courier-Bold"),
];

impl Default for ReportFonts {
    fn default() -> Self {
        let (_, regular, bold) = FONT_FAMILIES[0];
        Self::base(regular, bold)
    }
}

impl ReportFonts {
    fn base(regular: &'static str, bold: &'static str) -> Self {
        Self {
            regular: FontFace::Base(regular),
            bold: FontFace::Base(bold),
        }
    }

    /// Resolves a `.ttf`/`.otf` path, or a base family name such as
    /// `"Times"` or `"Times-Roman"`.
    pub fn resolve(requested: &str) -> Result<Self, ReportError> {
        let requested = requested.trim();
        if is_font_file(requested) {
            return Self::from_file(Path::new(requested));
        }

        let wanted = requested.to_lowercase();
        FONT_FAMILIES
            .iter()
            .find(|(family, regular, _)| {
                wanted == *family
                    || wanted == regular.to_lowercase()
                    || wanted.starts_with(&format!("{}-", family))
            })
            .map(|(_, regular, bold)| Self::base(*regular, *bold))
            .ok_or_else(|| ReportError::UnknownFont(requested.to_string()))
    }

    /// Embeds the font file for regular text. A sibling `<stem>-Bold.<ext>`
    /// is used for bold text when present.
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let regular = Arc::new(EmbeddedFont::from_file(path)?);
        let bold = match bold_sibling(path).map(|sibling| EmbeddedFont::from_file(&sibling)) {
            Some(Ok(bold)) => Arc::new(bold),
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring unreadable bold font");
                Arc::clone(&regular)
            }
            None => Arc::clone(&regular),
        };

        Ok(Self {
            regular: FontFace::Embedded(regular),
            bold: FontFace::Embedded(bold),
        })
    }

    /// The configured typeface, or Helvetica when none is configured or it
    /// cannot be loaded.
    pub fn load(requested: Option<&str>) -> Self {
        match requested.map(Self::resolve) {
            None => Self::default(),
            Some(Ok(fonts)) => fonts,
            Some(Err(e)) => {
                warn!(error = %e, "Falling back to the default report typeface");
                Self::default()
            }
        }
    }
}

fn is_font_file(requested: &str) -> bool {
    Path::new(requested)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
}

fn bold_sibling(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    let sibling = path.with_file_name(format!("{}-Bold.{}", stem, ext));
    sibling.is_file().then_some(sibling)
}

pub struct ReportInput<'a> {
    pub child_name: &'a str,
    pub generated_on: NaiveDate,
    pub filters_label: String,
    pub task_count: usize,
    pub map: &'a SkillsMap,
    pub sections: &'a [SectionProgress],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns_per_page: usize,
    pub rows_per_page: usize,
    pub row_height: f32,
}

fn grid_height() -> f32 {
    PAGE_HEIGHT - 2.0 * MARGIN - TITLE_BAND - COLUMN_HEADER - LEGEND_BAND - FOOTER_BAND
}

/// Fits `row_count` rows into the grid area, shrinking the row height down
/// to [`MIN_ROW_HEIGHT`] before splitting rows across pages.
pub fn grid_layout(row_count: usize) -> GridLayout {
    let columns_per_page = (((PAGE_WIDTH - 2.0 * MARGIN) / COLUMN_WIDTH).floor() as usize).max(1);
    let available = grid_height();
    let rows = row_count.max(1);

    let (rows_per_page, row_height) = if rows as f32 * MAX_ROW_HEIGHT <= available {
        (rows, MAX_ROW_HEIGHT)
    } else if rows as f32 * MIN_ROW_HEIGHT <= available {
        (rows, available / rows as f32)
    } else {
        (
            ((available / MIN_ROW_HEIGHT).floor() as usize).max(1),
            MIN_ROW_HEIGHT,
        )
    };

    GridLayout {
        columns_per_page,
        rows_per_page,
        row_height,
    }
}

pub fn summary_rows_per_page() -> usize {
    let available = PAGE_HEIGHT - 2.0 * MARGIN - TITLE_BAND - FOOTER_BAND - SUMMARY_ROW_HEIGHT;
    ((available / SUMMARY_ROW_HEIGHT).floor() as usize).max(1)
}

pub fn truncate_text(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let keep = budget.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Download name `ablls_<name>_<date>.pdf`, restricted to `[A-Za-z0-9_-]`.
pub fn report_filename(child_name: &str, date: NaiveDate) -> String {
    let mut name = String::with_capacity(child_name.len());
    for c in child_name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    let name = name.trim_matches('_');
    let name = if name.is_empty() { "child" } else { name };

    format!("ablls_{}_{}.pdf", name, date.format("%Y-%m-%d"))
}

/// Latin-1 bytes for WinAnsi-encoded base fonts; anything wider becomes `?`.
fn pdf_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weight {
    Regular,
    Bold,
}

impl Weight {
    fn resource(self) -> &'static str {
        match self {
            Weight::Regular => "F1",
            Weight::Bold => "F2",
        }
    }
}

enum FaceEncoder<'f> {
    WinAnsi(&'static str),
    /// Identity-H: two-byte glyph ids, with the character each glyph was
    /// first used for kept for the ToUnicode map.
    Glyphs {
        font: &'f EmbeddedFont,
        face: Face<'f>,
        used: BTreeMap<u16, char>,
    },
}

impl<'f> FaceEncoder<'f> {
    fn new(face: &'f FontFace) -> Result<Self, ReportError> {
        Ok(match face {
            FontFace::Base(name) => FaceEncoder::WinAnsi(*name),
            FontFace::Embedded(font) => FaceEncoder::Glyphs {
                font: &**font,
                face: font.face()?,
                used: BTreeMap::new(),
            },
        })
    }

    fn encode(&mut self, text: &str) -> Object {
        match self {
            FaceEncoder::WinAnsi(_) => pdf_string(text),
            FaceEncoder::Glyphs { face, used, .. } => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let (glyph, source) = match face.glyph_index(c) {
                        Some(glyph) => (glyph.0, c),
                        None => (face.glyph_index('?').map_or(0, |glyph| glyph.0), '?'),
                    };
                    used.entry(glyph).or_insert(source);
                    bytes.extend_from_slice(&glyph.to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }

    fn add_to(&self, doc: &mut Document) -> ObjectId {
        match self {
            FaceEncoder::WinAnsi(name) => doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => *name,
                "Encoding" => "WinAnsiEncoding",
            }),
            FaceEncoder::Glyphs { font, face, used } => embed_font(doc, font, face, used),
        }
    }

    fn is_cff(&self) -> bool {
        matches!(self, FaceEncoder::Glyphs { font, .. } if font.outlines == Outlines::Cff)
    }
}

fn embed_font(
    doc: &mut Document,
    font: &EmbeddedFont,
    face: &Face<'_>,
    used: &BTreeMap<u16, char>,
) -> ObjectId {
    let scale = 1000.0 / f32::from(face.units_per_em().max(1));
    let scaled = |value: i16| (f32::from(value) * scale).round() as i64;
    let name = Object::Name(font.name.as_bytes().to_vec());

    let (file_key, file_id, cid_subtype) = match font.outlines {
        Outlines::TrueType => {
            let file = Stream::new(
                dictionary! { "Length1" => font.data.len() as i64 },
                font.data.clone(),
            );
            ("FontFile2", doc.add_object(file), "CIDFontType2")
        }
        Outlines::Cff => {
            let file = Stream::new(dictionary! { "Subtype" => "OpenType" }, font.data.clone());
            ("FontFile3", doc.add_object(file), "CIDFontType0")
        }
    };

    let bbox = face.global_bounding_box();
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => name.clone(),
        "Flags" => 32_i64,
        "FontBBox" => vec![
            Object::Integer(scaled(bbox.x_min)),
            Object::Integer(scaled(bbox.y_min)),
            Object::Integer(scaled(bbox.x_max)),
            Object::Integer(scaled(bbox.y_max)),
        ],
        "ItalicAngle" => 0_i64,
        "Ascent" => scaled(face.ascender()),
        "Descent" => scaled(face.descender()),
        "CapHeight" => scaled(face.capital_height().unwrap_or_else(|| face.ascender())),
        "StemV" => 80_i64,
    };
    descriptor.set(file_key, file_id);
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<Object> = used
        .keys()
        .flat_map(|&glyph| {
            let advance = face
                .glyph_hor_advance(GlyphId(glyph))
                .map_or(0, |advance| (f32::from(advance) * scale).round() as i64);
            [
                Object::Integer(i64::from(glyph)),
                Object::Array(vec![Object::Integer(advance)]),
            ]
        })
        .collect();

    let mut descendant = dictionary! {
        "Type" => "Font",
        "Subtype" => cid_subtype,
        "BaseFont" => name.clone(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0_i64,
        },
        "FontDescriptor" => descriptor_id,
        "W" => widths,
    };
    if font.outlines == Outlines::TrueType {
        descendant.set("CIDToGIDMap", "Identity");
    }
    let descendant_id = doc.add_object(descendant);
    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(used)));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => name,
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(descendant_id)],
        "ToUnicode" => to_unicode_id,
    })
}

/// CMap from two-byte glyph ids back to UTF-16BE, so text can be copied and
/// searched in viewers.
pub fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        let _ = writeln!(cmap, "{} beginbfchar", block.len());
        for (glyph, c) in block {
            let mut units = [0u16; 2];
            let _ = write!(cmap, "<{:04X}> <", glyph);
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(cmap, "{:04X}", unit);
            }
            cmap.push_str(">\n");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap.into_bytes()
}

/// Collects page content while tracking which glyphs each font needs.
struct Canvas<'f> {
    faces: Vec<FaceEncoder<'f>>,
    bold_slot: usize,
    current: Vec<Operation>,
    pages: Vec<Vec<Operation>>,
}

impl<'f> Canvas<'f> {
    fn new(fonts: &'f ReportFonts) -> Result<Self, ReportError> {
        let mut faces = vec![FaceEncoder::new(&fonts.regular)?];
        let shared = match (&fonts.regular, &fonts.bold) {
            (FontFace::Embedded(regular), FontFace::Embedded(bold)) => Arc::ptr_eq(regular, bold),
            _ => false,
        };
        let bold_slot = if shared {
            0
        } else {
            faces.push(FaceEncoder::new(&fonts.bold)?);
            1
        };

        Ok(Self {
            faces,
            bold_slot,
            current: Vec::new(),
            pages: Vec::new(),
        })
    }

    fn slot(&self, weight: Weight) -> usize {
        match weight {
            Weight::Regular => 0,
            Weight::Bold => self.bold_slot,
        }
    }

    fn text(&mut self, weight: Weight, size: f32, x: f32, y: f32, text: &str) {
        let slot = self.slot(weight);
        let encoded = self.faces[slot].encode(text);
        self.current.push(Operation::new("BT", vec![]));
        self.current.push(Operation::new(
            "Tf",
            vec![
                Object::Name(weight.resource().as_bytes().to_vec()),
                Object::Real(size),
            ],
        ));
        self.current
            .push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        self.current.push(Operation::new("Tj", vec![encoded]));
        self.current.push(Operation::new("ET", vec![]));
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, fill: Option<(f32, f32, f32)>) {
        let ops = &mut self.current;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("w", vec![Object::Real(0.5)]));
        ops.push(Operation::new(
            "RG",
            vec![Object::Real(0.6), Object::Real(0.6), Object::Real(0.6)],
        ));
        let paint = match fill {
            Some((r, g, b)) => {
                ops.push(Operation::new(
                    "rg",
                    vec![Object::Real(r), Object::Real(g), Object::Real(b)],
                ));
                "B"
            }
            None => "S",
        };
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(w),
                Object::Real(h),
            ],
        ));
        ops.push(Operation::new(paint, vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn title(&mut self, input: &ReportInput<'_>, heading: &str) {
        let top = PAGE_HEIGHT - MARGIN;
        self.text(
            Weight::Bold,
            14.0,
            MARGIN,
            top - 14.0,
            &truncate_text(
                &format!("{}: {}", heading, input.child_name),
                TITLE_TEXT_BUDGET,
            ),
        );
        self.text(
            Weight::Regular,
            8.0,
            MARGIN,
            top - 28.0,
            &report_subtitle(input),
        );
    }

    fn finish_page(&mut self) {
        let ops = std::mem::take(&mut self.current);
        self.pages.push(ops);
    }

    fn number_pages(&mut self) {
        let total = self.pages.len();
        let slot = self.slot(Weight::Regular);
        for (index, ops) in self.pages.iter_mut().enumerate() {
            let footer = self.faces[slot].encode(&format!("Page {} of {}", index + 1, total));
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(Weight::Regular.resource().as_bytes().to_vec()),
                    Object::Real(7.0),
                ],
            ));
            ops.push(Operation::new(
                "Td",
                vec![
                    Object::Real(PAGE_WIDTH - MARGIN - 60.0),
                    Object::Real(MARGIN),
                ],
            ));
            ops.push(Operation::new("Tj", vec![footer]));
            ops.push(Operation::new("ET", vec![]));
        }
    }
}

/// `Generated <date> | <n> skills | <filters>`, cut to fit one line.
pub fn report_subtitle(input: &ReportInput<'_>) -> String {
    truncate_text(
        &format!(
            "Generated {} | {} skills | {}",
            input.generated_on.format("%Y-%m-%d"),
            input.task_count,
            input.filters_label
        ),
        SUBTITLE_TEXT_BUDGET,
    )
}

fn render_grid_pages(input: &ReportInput<'_>, canvas: &mut Canvas<'_>) {
    let map = input.map;
    let chunk_width = grid_layout(0).columns_per_page;
    let legend = map.legend();

    for column_chunk in map.columns.chunks(chunk_width) {
        let chunk_rows = column_chunk
            .iter()
            .map(|c| c.cells.len())
            .max()
            .unwrap_or(0);
        let layout = grid_layout(chunk_rows);
        let row_starts: Vec<usize> = (0..chunk_rows.max(1)).step_by(layout.rows_per_page).collect();

        for row_start in row_starts {
            canvas.title(input, "ABLLS-R skills map");

            let grid_top = PAGE_HEIGHT - MARGIN - TITLE_BAND;
            let font_size = (layout.row_height * 0.6).clamp(4.0, 7.0);

            for (index, column) in column_chunk.iter().enumerate() {
                let x = MARGIN + index as f32 * COLUMN_WIDTH;
                canvas.text(
                    Weight::Bold,
                    9.0,
                    x + 4.0,
                    grid_top - COLUMN_HEADER + 4.0,
                    &column.section_code,
                );

                let row_end = (row_start + layout.rows_per_page).min(chunk_rows);
                for (row, grid_row) in (row_start..row_end).enumerate() {
                    let y = grid_top - COLUMN_HEADER - (row as f32 + 1.0) * layout.row_height;
                    if let Some(MapCell::Skill { code, level, .. }) =
                        column.cell_at(grid_row, chunk_rows)
                    {
                        let fill = match level {
                            SkillLevel::None => None,
                            other => Some(other.rgb()),
                        };
                        canvas.rect(x, y, COLUMN_WIDTH, layout.row_height, fill);
                        canvas.text(
                            Weight::Regular,
                            font_size,
                            x + 3.0,
                            y + (layout.row_height - font_size) / 2.0 + 1.0,
                            code,
                        );
                    }
                }
            }

            let mut legend_x = MARGIN;
            let legend_y = MARGIN + FOOTER_BAND + 8.0;
            for entry in &legend {
                canvas.rect(legend_x, legend_y, 10.0, 8.0, Some(entry.level.rgb()));
                let caption = format!("{}: {}", entry.label, entry.count);
                canvas.text(Weight::Regular, 7.0, legend_x + 13.0, legend_y + 1.0, &caption);
                legend_x += 150.0;
            }

            canvas.finish_page();
        }
    }
}

fn render_summary_pages(input: &ReportInput<'_>, canvas: &mut Canvas<'_>) {
    let per_page = summary_rows_per_page();
    let chunks: Vec<&[SectionProgress]> = if input.sections.is_empty() {
        vec![&[]]
    } else {
        input.sections.chunks(per_page).collect()
    };

    for chunk in chunks {
        canvas.title(input, "Section summary");

        let mut y = PAGE_HEIGHT - MARGIN - TITLE_BAND - SUMMARY_ROW_HEIGHT;
        let mut x = MARGIN;
        for (heading, width) in SUMMARY_COLUMNS {
            canvas.rect(x, y, width, SUMMARY_ROW_HEIGHT, Some((0.9, 0.9, 0.9)));
            canvas.text(Weight::Bold, 9.0, x + 4.0, y + 5.0, heading);
            x += width;
        }

        for row in chunk {
            y -= SUMMARY_ROW_HEIGHT;
            let cells = [
                truncate_text(
                    &format!("{} - {}", row.section_code, row.section_name),
                    SECTION_TEXT_BUDGET,
                ),
                row.mastered.to_string(),
                row.scored.to_string(),
                row.total.to_string(),
                format!("{:.1}", row.completion_pct),
                format!("{:.1}", row.score_pct),
            ];
            let mut x = MARGIN;
            for ((_, width), value) in SUMMARY_COLUMNS.iter().zip(cells.iter()) {
                canvas.rect(x, y, *width, SUMMARY_ROW_HEIGHT, None);
                canvas.text(Weight::Regular, 9.0, x + 4.0, y + 5.0, value);
                x += width;
            }
        }

        canvas.finish_page();
    }
}

fn assemble(mut canvas: Canvas<'_>) -> Result<Vec<u8>, ReportError> {
    canvas.number_pages();

    let version = if canvas.faces.iter().any(FaceEncoder::is_cff) {
        "1.6"
    } else {
        "1.5"
    };
    let mut doc = Document::with_version(version);
    let pages_id = doc.new_object_id();

    let font_ids: Vec<ObjectId> = canvas
        .faces
        .iter()
        .map(|face| face.add_to(&mut doc))
        .collect();
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Weight::Regular.resource() => font_ids[canvas.slot(Weight::Regular)],
            Weight::Bold.resource() => font_ids[canvas.slot(Weight::Bold)],
        },
    });

    let total = canvas.pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for operations in canvas.pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

#[instrument(skip(input, fonts), fields(child = %input.child_name, columns = input.map.columns.len()))]
pub fn render_report(input: &ReportInput<'_>, fonts: &ReportFonts) -> Result<Vec<u8>, ReportError> {
    let mut canvas = Canvas::new(fonts)?;
    render_grid_pages(input, &mut canvas);
    render_summary_pages(input, &mut canvas);
    assemble(canvas)
}
