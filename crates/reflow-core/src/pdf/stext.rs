//! Assembly of structured-text glyphs into styled lines.
//!
//! MuPDF reports characters with positions and sizes but not the font that
//! drew them. Font name and weight are taken from the overlapping span of a
//! style reference, usually the content stream interpreter's output for the
//! same page.

#![cfg_attr(not(feature = "mupdf"), allow(dead_code))]

use super::{TextBlock, TextLine, TextSpan};
use crate::models::BBox;

/// One character from a structured text page, top-left coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub ch: char,
    pub bbox: BBox,
    pub size: f32,
}

fn intersection_area(a: &BBox, b: &BBox) -> f32 {
    let w = (a.x1.min(b.x1) - a.x0.max(b.x0)).max(0.0);
    let h = (a.y1.min(b.y1) - a.y0.max(b.y0)).max(0.0);
    w * h
}

/// Reference span covering most of `bbox`.
pub(crate) fn style_for<'s>(bbox: &BBox, styles: &'s [TextSpan]) -> Option<&'s TextSpan> {
    styles
        .iter()
        .map(|s| (s, intersection_area(bbox, &s.bbox)))
        .filter(|(_, area)| *area > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| s)
}

fn same_style(span: &TextSpan, size: f32, style: Option<&TextSpan>) -> bool {
    if (span.size - size).abs() >= 0.5 {
        return false;
    }
    match style {
        Some(s) => s.font_name == span.font_name && s.bold == span.bold && s.italic == span.italic,
        None => true,
    }
}

/// Split a line's glyphs into spans at size or font changes.
///
/// Whitespace glyphs never start a span of their own.
pub(crate) fn assemble_line(glyphs: &[Glyph], styles: &[TextSpan]) -> Option<TextLine> {
    let mut spans: Vec<TextSpan> = Vec::new();

    for glyph in glyphs {
        let style = style_for(&glyph.bbox, styles);
        match spans.last_mut() {
            Some(span) if glyph.ch.is_whitespace() || same_style(span, glyph.size, style) => {
                span.text.push(glyph.ch);
                span.bbox = span.bbox.union(&glyph.bbox);
            }
            _ => {
                let inherited = style.or_else(|| spans.last());
                spans.push(TextSpan {
                    text: glyph.ch.to_string(),
                    font_name: inherited.map(|s| s.font_name.clone()).unwrap_or_default(),
                    size: glyph.size,
                    bold: inherited.is_some_and(|s| s.bold),
                    italic: inherited.is_some_and(|s| s.italic),
                    bbox: glyph.bbox,
                });
            }
        }
    }

    if spans.iter().all(|s| s.text.trim().is_empty()) {
        return None;
    }
    let bbox = spans.iter().skip(1).fold(spans[0].bbox, |acc, s| acc.union(&s.bbox));
    Some(TextLine { bbox, spans })
}

/// A block from its assembled lines, dropped when none carry text.
pub(crate) fn assemble_block(lines: Vec<TextLine>) -> Option<TextBlock> {
    let first = lines.first()?.bbox;
    let bbox = lines.iter().fold(first, |acc, l| acc.union(&l.bbox));
    Some(TextBlock { bbox, lines })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(text: &str, x: f32, y: f32, size: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let x0 = x + i as f32 * size * 0.5;
                Glyph { ch, bbox: BBox::new(x0, y, x0 + size * 0.5, y + size), size }
            })
            .collect()
    }

    fn style(name: &str, bold: bool, bbox: BBox) -> TextSpan {
        TextSpan { text: String::new(), font_name: name.to_string(), size: 12.0, bold, italic: false, bbox }
    }

    #[test]
    fn test_size_change_splits_span() {
        let mut line = glyphs("Total ", 72.0, 100.0, 12.0);
        line.extend(glyphs("42", 108.0, 96.0, 18.0));

        let line = assemble_line(&line, &[]).unwrap();
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].text, "Total ");
        assert_eq!(line.spans[1].text, "42");
        assert_eq!(line.text(), "Total 42");
        assert_eq!(line.bbox.y0, 96.0);
    }

    #[test]
    fn test_style_comes_from_overlapping_reference() {
        let references = [
            style("Helvetica-Bold", true, BBox::new(70.0, 98.0, 100.0, 114.0)),
            style("Helvetica", false, BBox::new(100.0, 98.0, 200.0, 114.0)),
        ];
        let mut line = glyphs("Name", 72.0, 100.0, 12.0);
        line.extend(glyphs("Alice", 110.0, 100.0, 12.0));

        let line = assemble_line(&line, &references).unwrap();
        assert_eq!(line.spans.len(), 2);
        assert!(line.spans[0].bold);
        assert_eq!(line.spans[0].font_name, "Helvetica-Bold");
        assert!(!line.spans[1].bold);
        assert_eq!(line.spans[1].text, "Alice");
    }

    #[test]
    fn test_blank_line_is_dropped() {
        assert!(assemble_line(&glyphs("   ", 0.0, 0.0, 10.0), &[]).is_none());
        assert!(assemble_block(Vec::new()).is_none());
    }
}
