//! Fonts for drawing text onto template pages
//!
//! Two kinds are supported:
//! - the standard Type1 fonts Helvetica and Courier (no embedding, WinAnsi)
//! - TrueType/OpenType fonts parsed with ttf-parser and embedded as a
//!   Type0/CIDFontType2 font with Identity-H encoding

use crate::error::LayoutError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;

/// Helvetica advance widths for WinAnsi codes 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

/// The standard PDF fonts available without embedding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StandardFont {
    Helvetica,
    Courier,
}

impl StandardFont {
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::Courier => "Courier",
        }
    }

    fn ascender(&self) -> i16 {
        match self {
            StandardFont::Helvetica => 718,
            StandardFont::Courier => 629,
        }
    }

    fn descender(&self) -> i16 {
        match self {
            StandardFont::Helvetica => -207,
            StandardFont::Courier => -157,
        }
    }

    fn code_width(&self, code: u8) -> u16 {
        match self {
            StandardFont::Courier => 600,
            StandardFont::Helvetica => match code {
                32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
                _ => 556,
            },
        }
    }
}

/// Map a character to its single-byte WinAnsi code; unmappable characters become '?'
fn win_ansi_code(ch: char) -> u8 {
    match ch as u32 {
        code @ 0x20..=0x7E => code as u8,
        code @ 0xA0..=0xFF => code as u8,
        _ => b'?',
    }
}

/// Metrics and glyph mapping of a parsed TrueType/OpenType font
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    data: Vec<u8>,
    postscript_name: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    /// char -> (glyph id, advance width in font units)
    glyphs: HashMap<char, (u16, u16)>,
    default_advance: u16,
}

impl TrueTypeFont {
    pub fn parse(data: Vec<u8>) -> Result<Self, LayoutError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| LayoutError::Font(format!("Failed to parse font: {}", e)))?;

        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let rect = face.global_bounding_box();
        let bbox = [rect.x_min, rect.y_min, rect.x_max, rect.y_max];

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| sanitize_font_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "EmbeddedFont".to_string());

        let mut glyphs = HashMap::new();
        let mut default_advance = 0u16;
        for code in 0x20u32..=0xFFFF {
            let Some(ch) = char::from_u32(code) else {
                continue;
            };
            if let Some(glyph_id) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                glyphs.insert(ch, (glyph_id.0, advance));
                if ch == ' ' {
                    default_advance = advance;
                }
            }
        }
        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Ok(Self {
            postscript_name,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox,
            glyphs,
            default_advance,
            data,
        })
    }

    fn advance(&self, ch: char) -> u16 {
        self.glyphs
            .get(&ch)
            .map(|&(_, advance)| advance)
            .unwrap_or(self.default_advance)
    }

    fn glyph_id(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).map(|&(gid, _)| gid).unwrap_or(0)
    }

    /// Convert font units to 1/1000 em
    fn to_pdf_units(&self, value: i32) -> i64 {
        (value as i64 * 1000) / self.units_per_em.max(1) as i64
    }
}

fn sanitize_font_name(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect()
}

/// The font every text element of a render is drawn with
#[derive(Debug, Clone)]
pub enum Font {
    Standard(StandardFont),
    TrueType(Box<TrueTypeFont>),
}

impl Font {
    pub fn standard(font: StandardFont) -> Self {
        Font::Standard(font)
    }

    pub fn from_true_type(data: Vec<u8>) -> Result<Self, LayoutError> {
        Ok(Font::TrueType(Box::new(TrueTypeFont::parse(data)?)))
    }

    /// Width of `text` in points at `size`
    pub fn width_of_text_at_size(&self, text: &str, size: f32) -> f32 {
        let (units, units_per_em): (u32, u32) = match self {
            Font::Standard(font) => (
                text.chars()
                    .map(|ch| font.code_width(win_ansi_code(ch)) as u32)
                    .sum(),
                1000,
            ),
            Font::TrueType(font) => (
                text.chars().map(|ch| font.advance(ch) as u32).sum(),
                font.units_per_em.max(1) as u32,
            ),
        };
        units as f32 / units_per_em as f32 * size
    }

    /// Line height in points at `size`: ascender to descender
    pub fn height_at_size(&self, size: f32) -> f32 {
        match self {
            Font::Standard(font) => {
                (font.ascender() as f32 - font.descender() as f32) / 1000.0 * size
            }
            Font::TrueType(font) => {
                (font.ascender as f32 - font.descender as f32) / font.units_per_em.max(1) as f32
                    * size
            }
        }
    }

    /// Encode text as a string operand for `Tj`
    pub(crate) fn encode(&self, text: &str) -> Object {
        match self {
            Font::Standard(_) => {
                let bytes = text.chars().map(win_ansi_code).collect();
                Object::String(bytes, StringFormat::Literal)
            }
            Font::TrueType(font) => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    bytes.extend_from_slice(&font.glyph_id(ch).to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }

    /// Build the font dictionary, adding any dependent objects to `doc`
    pub(crate) fn build_dictionary(
        &self,
        doc: &mut Document,
        used_chars: &BTreeSet<char>,
    ) -> Result<Dictionary, LayoutError> {
        match self {
            Font::Standard(font) => Ok(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            }),
            Font::TrueType(font) => build_type0_font(doc, font, used_chars),
        }
    }
}

fn build_type0_font(
    doc: &mut Document,
    font: &TrueTypeFont,
    used_chars: &BTreeSet<char>,
) -> Result<Dictionary, LayoutError> {
    let compressed = zlib(&font.data).map_err(|e| LayoutError::Font(e.to_string()))?;
    let font_file = Stream::new(
        dictionary! {
            "Length1" => font.data.len() as i64,
            "Filter" => "FlateDecode",
        },
        compressed,
    )
    .with_compression(false);
    let font_file_id = doc.add_object(font_file);

    let base_font = font.postscript_name.as_str();
    let bbox: Vec<Object> = font
        .bbox
        .iter()
        .map(|&v| Object::Integer(font.to_pdf_units(v as i32)))
        .collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_font.as_bytes().to_vec()),
        "Flags" => 4,
        "FontBBox" => bbox,
        "ItalicAngle" => 0,
        "Ascent" => font.to_pdf_units(font.ascender as i32),
        "Descent" => font.to_pdf_units(font.descender as i32),
        "CapHeight" => font.to_pdf_units(font.cap_height as i32),
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });

    // W array: [gid [width] gid [width] ...] for every glyph actually drawn
    let mut widths: Vec<(u16, i64)> = used_chars
        .iter()
        .map(|&ch| (font.glyph_id(ch), font.to_pdf_units(font.advance(ch) as i32)))
        .collect();
    widths.sort_unstable();
    widths.dedup_by_key(|(gid, _)| *gid);
    let mut w_array = Vec::with_capacity(widths.len() * 2);
    for (gid, width) in &widths {
        w_array.push(Object::Integer(*gid as i64));
        w_array.push(Object::Array(vec![Object::Integer(*width)]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => font.to_pdf_units(font.default_advance as i32),
        "W" => w_array,
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode = Stream::new(Dictionary::new(), to_unicode_cmap(font, used_chars));
    let to_unicode_id = doc.add_object(to_unicode);

    Ok(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    })
}

/// ToUnicode CMap mapping each drawn glyph id back to its character
fn to_unicode_cmap(font: &TrueTypeFont, used_chars: &BTreeSet<char>) -> Vec<u8> {
    let mut mappings: Vec<(u16, char)> = used_chars
        .iter()
        .map(|&ch| (font.glyph_id(ch), ch))
        .filter(|&(gid, _)| gid != 0)
        .collect();
    mappings.sort_unstable();
    mappings.dedup_by_key(|(gid, _)| *gid);

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    // At most 100 entries per bfchar block
    for chunk in mappings.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, utf16));
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

pub(crate) fn zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
