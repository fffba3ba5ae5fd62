//! Font metadata and character decoding.

use std::collections::HashMap;

use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object};
use regex::Regex;

use super::content::number;

lazy_static! {
    static ref BOLD_NAME: Regex = Regex::new(r"(?i)bold|black|heavy|semibold|demi").unwrap();
    static ref ITALIC_NAME: Regex = Regex::new(r"(?i)italic|oblique").unwrap();
    static ref SUBSET_PREFIX: Regex = Regex::new(r"^[A-Z]{6}\+").unwrap();
}

/// FontDescriptor flag bits.
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecodedGlyph {
    pub text: String,
    /// Advance width in glyph space (thousandths of an em).
    pub width: f32,
    /// Single-byte code 32, which receives word spacing.
    pub is_space: bool,
}

/// What the interpreter needs to know about a font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontInfo {
    pub name: String,
    pub bold: bool,
    pub italic: bool,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    to_unicode: HashMap<u32, String>,
}

impl FontInfo {
    /// Helvetica-like metrics for text shown without a usable font.
    pub fn fallback() -> Self {
        Self {
            name: "Helvetica".to_string(),
            bold: false,
            italic: false,
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 500.0,
            to_unicode: HashMap::new(),
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = Self::fallback();

        let base_font = name_of(dict.get(b"BaseFont").ok()).unwrap_or_default();
        font.name = SUBSET_PREFIX.replace(&base_font, "").into_owned();
        if font.name.is_empty() {
            font.name = "Helvetica".to_string();
        }
        font.bold = BOLD_NAME.is_match(&font.name);
        font.italic = ITALIC_NAME.is_match(&font.name);

        let subtype = name_of(dict.get(b"Subtype").ok()).unwrap_or_default();
        let descriptor_owner = if subtype == "Type0" {
            font.two_byte = true;
            font.default_width = 1000.0;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok());
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(number) {
                    font.default_width = dw;
                }
                if let Some(Object::Array(w)) = cid_font.get(b"W").ok().and_then(|o| resolve(doc, o)) {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            font.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(number)
                .map(|n| n as u32)
                .unwrap_or(0);
            if let Some(Object::Array(w)) = dict.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
                font.widths = w
                    .iter()
                    .map(|o| resolve(doc, o).and_then(number).unwrap_or(0.0))
                    .collect();
            }
            Some(dict)
        };

        let descriptor = descriptor_owner
            .and_then(|d| d.get(b"FontDescriptor").ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());
        if let Some(descriptor) = descriptor {
            let flags = descriptor.get(b"Flags").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0);
            let weight = descriptor.get(b"FontWeight").ok().and_then(number).unwrap_or(400.0);
            let angle = descriptor.get(b"ItalicAngle").ok().and_then(number).unwrap_or(0.0);
            font.bold |= flags & FLAG_FORCE_BOLD != 0 || weight >= 600.0;
            font.italic |= flags & FLAG_ITALIC != 0 || angle != 0.0;
            if let Some(mw) = descriptor.get(b"MissingWidth").ok().and_then(number) {
                if !font.two_byte && mw > 0.0 {
                    font.default_width = mw;
                }
            }
        }

        if let Some(Object::Stream(stream)) = dict.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            font.to_unicode = parse_to_unicode(&data);
        }

        font
    }

    /// Split a shown string into character codes.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    let text = self
                        .to_unicode
                        .get(&code)
                        .cloned()
                        .unwrap_or_else(|| char::from_u32(code).map(String::from).unwrap_or_default());
                    let width = self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
                    DecodedGlyph { text, width, is_space: false }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| {
                    let code = b as u32;
                    let text = self
                        .to_unicode
                        .get(&code)
                        .cloned()
                        .unwrap_or_else(|| win_ansi(b).to_string());
                    let width = code
                        .checked_sub(self.first_char)
                        .and_then(|i| self.widths.get(i as usize))
                        .copied()
                        .filter(|w| *w > 0.0)
                        .unwrap_or(self.default_width);
                    DecodedGlyph { text, width, is_space: b == b' ' }
                })
                .collect()
        }
    }
}

fn resolve<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Object> {
    doc.dereference(obj).ok().map(|(_, o)| o)
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    obj.and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

/// Parse a CIDFont `W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(&items[i]) else {
            i += 1;
            continue;
        };
        let first = first as u32;
        match items.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(w) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(last).map(|n| n as u32).unwrap_or(first);
                if let Some(w) = items.get(i + 2).and_then(number) {
                    for code in first..=last.min(first + 0xFFFF) {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) != Some(&b'<') => {
                let end = data[i + 1..].iter().position(|&b| b == b'>').map(|p| i + 1 + p);
                let Some(end) = end else { break };
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .filter(|b| b.is_ascii_hexdigit())
                    .copied()
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let padded = if s.len() == 1 { format!("{}0", s) } else { s.to_string() };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| {
            if pair.len() == 2 {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                pair[0] as u16
            }
        })
        .collect()
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while let (Some(CMapToken::Hex(src)), Some(CMapToken::Hex(dst))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    map.insert(code_of(src), String::from_utf16_lossy(&utf16_units(dst)));
                    i += 2;
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while let (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match tokens.get(i + 2) {
                        Some(CMapToken::Hex(dst)) => {
                            let base = utf16_units(dst);
                            for (offset, code) in (lo..=hi.min(lo + 0xFFFF)).enumerate() {
                                let mut units = base.clone();
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&units));
                            }
                            i += 3;
                        }
                        Some(CMapToken::ArrayStart) => {
                            i += 3;
                            let mut code = lo;
                            while let Some(CMapToken::Hex(dst)) = tokens.get(i) {
                                if code <= hi {
                                    map.insert(code, String::from_utf16_lossy(&utf16_units(dst)));
                                }
                                code += 1;
                                i += 1;
                            }
                            if matches!(tokens.get(i), Some(CMapToken::ArrayEnd)) {
                                i += 1;
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    map
}

/// WinAnsiEncoding for the codes that differ from Latin-1.
fn win_ansi(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        other => other as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_parse_bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin
            2 beginbfchar
            <0003> <0020>
            <0011> <0041>
            endbfchar
            2 beginbfrange
            <0020> <0022> <0061>
            <0030> <0031> [<0078> <0079>]
            endbfrange
            end";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x21).map(String::as_str), Some("b"));
        assert_eq!(map.get(&0x22).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("y"));
    }

    #[test]
    fn test_style_from_base_font_name() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Arial-BoldItalic",
        };
        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.name, "Arial-BoldItalic");
        assert!(font.bold);
        assert!(font.italic);
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Courier",
            "FirstChar" => Object::Integer(65),
            "Widths" => vec![Object::Integer(600), Object::Integer(610)],
        };
        let font = FontInfo::from_dict(&doc, &dict);
        let glyphs = font.decode(b"AB ");
        assert_eq!(glyphs[0].width, 600.0);
        assert_eq!(glyphs[1].width, 610.0);
        assert_eq!(glyphs[2].width, 500.0);
        assert!(glyphs[2].is_space);
        assert!(!font.bold);
    }

    #[test]
    fn test_win_ansi_quotes() {
        let font = FontInfo::fallback();
        let text: String = font.decode(&[0x93, b'x', 0x94]).into_iter().map(|g| g.text).collect();
        assert_eq!(text, "\u{201C}x\u{201D}");
    }
}
