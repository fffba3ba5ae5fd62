//! Grouping of positioned glyph runs into lines and blocks.

use std::cmp::Ordering;

use super::content::GlyphRun;
use super::{TextBlock, TextLine, TextSpan};
use crate::models::BBox;

/// Fraction of the font size above the baseline covered by a span's box.
const ASCENT: f32 = 0.8;
/// Fraction of the font size below the baseline covered by a span's box.
const DESCENT: f32 = 0.2;

/// Page box in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox { x: 0.0, y: 0.0, width: 612.0, height: 792.0 };

    /// Convert a user-space y to a top-left-origin y.
    pub fn flip_y(&self, y: f32) -> f32 {
        self.y + self.height - y
    }
}

/// Tolerances that decide what shares a line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineSettings {
    pub row_tolerance: f32,
    pub gap_factor: f32,
}

#[derive(Debug, Clone)]
struct Placed<'a> {
    run: &'a GlyphRun,
    x0: f32,
    x1: f32,
    baseline: f32,
}

/// Group runs into reading-order blocks with top-left coordinates.
pub(crate) fn assemble_blocks(runs: &[GlyphRun], page: &PageBox, settings: LineSettings) -> Vec<TextBlock> {
    let mut placed: Vec<Placed> = runs
        .iter()
        .filter(|r| !r.text.is_empty())
        .map(|run| Placed {
            run,
            x0: run.x0 - page.x,
            x1: run.x1 - page.x,
            baseline: page.flip_y(run.baseline),
        })
        .collect();

    placed.sort_by(|a, b| {
        a.baseline
            .partial_cmp(&b.baseline)
            .unwrap_or(Ordering::Equal)
            .then(a.x0.partial_cmp(&b.x0).unwrap_or(Ordering::Equal))
    });

    // Rows of runs sharing a baseline.
    let mut rows: Vec<Vec<Placed>> = Vec::new();
    for item in placed {
        match rows.last_mut() {
            Some(row) if (item.baseline - row[0].baseline).abs() <= settings.row_tolerance => row.push(item),
            _ => rows.push(vec![item]),
        }
    }

    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut previous_single = false;

    for mut row in rows {
        row.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap_or(Ordering::Equal));
        let lines = split_row(&row, settings.gap_factor);
        let single = lines.len() == 1;

        for line in lines {
            let attach = single
                && previous_single
                && blocks.last().is_some_and(|block| continues_block(block, &line));
            match blocks.last_mut() {
                Some(block) if attach => {
                    block.bbox = block.bbox.union(&line.bbox);
                    block.lines.push(line);
                }
                _ => blocks.push(TextBlock { bbox: line.bbox, lines: vec![line] }),
            }
        }
        previous_single = single;
    }

    blocks
}

/// Whether a lone line reads as the next line of a paragraph block.
fn continues_block(block: &TextBlock, line: &TextLine) -> bool {
    let Some(last) = block.lines.last() else {
        return false;
    };
    let gap = line.bbox.y0 - last.bbox.y1;
    let height = line.bbox.height().max(1.0);
    last.bbox.overlaps_x(&line.bbox) && gap >= -height * 0.5 && gap <= height * 0.6
}

/// Split one baseline row into lines wherever the horizontal gap is wide.
fn split_row(row: &[Placed], gap_factor: f32) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut cursor: Option<f32> = None;

    for item in row {
        let size = item.run.size.max(1.0);
        let gap = cursor.map(|end| item.x0 - end);
        let span = make_span(item);

        match (lines.last_mut(), gap) {
            (Some(line), Some(gap)) if gap <= gap_factor * size => {
                append_span(line, span, gap, size);
            }
            _ => lines.push(TextLine { bbox: span.bbox, spans: vec![span] }),
        }
        cursor = Some(cursor.map_or(item.x1, |end| end.max(item.x1)));
    }

    lines
}

fn make_span(item: &Placed) -> TextSpan {
    let size = item.run.size;
    TextSpan {
        text: item.run.text.clone(),
        font_name: item.run.font.name.clone(),
        size,
        bold: item.run.font.bold,
        italic: item.run.font.italic,
        bbox: BBox::new(
            item.x0,
            item.baseline - ASCENT * size,
            item.x1,
            item.baseline + DESCENT * size,
        ),
    }
}

fn append_span(line: &mut TextLine, mut span: TextSpan, gap: f32, size: f32) {
    line.bbox = line.bbox.union(&span.bbox);
    let needs_space = gap > 0.15 * size;

    if let Some(last) = line.spans.last_mut() {
        let same_style = last.font_name == span.font_name
            && (last.size - span.size).abs() < 0.5
            && last.bold == span.bold
            && last.italic == span.italic;
        let space = if needs_space && !last.text.ends_with(' ') && !span.text.starts_with(' ') {
            " "
        } else {
            ""
        };

        if same_style {
            last.text.push_str(space);
            last.text.push_str(&span.text);
            last.bbox = last.bbox.union(&span.bbox);
            return;
        }
        span.text.insert_str(0, space);
    }
    line.spans.push(span);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fonts::FontInfo;
    use std::sync::Arc;

    fn run(text: &str, x0: f32, x1: f32, baseline: f32) -> GlyphRun {
        GlyphRun {
            text: text.to_string(),
            x0,
            x1,
            baseline,
            size: 10.0,
            font: Arc::new(FontInfo::fallback()),
        }
    }

    fn settings() -> LineSettings {
        LineSettings { row_tolerance: 3.0, gap_factor: 1.5 }
    }

    #[test]
    fn test_close_runs_join_with_space() {
        let runs = vec![run("Hello", 72.0, 97.0, 700.0), run("world", 100.0, 125.0, 700.0)];
        let blocks = assemble_blocks(&runs, &PageBox::LETTER, settings());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines[0].text(), "Hello world");
        assert!((blocks[0].lines[0].bbox.y0 - 84.0).abs() < 0.01);
    }

    #[test]
    fn test_wide_gap_splits_cells() {
        let runs = vec![
            run("Item", 72.0, 92.0, 700.0),
            run("Qty", 172.0, 187.0, 700.0),
            run("Price", 272.0, 297.0, 700.0),
        ];
        let blocks = assemble_blocks(&runs, &PageBox::LETTER, settings());
        let texts: Vec<String> = blocks.iter().flat_map(|b| b.lines.iter().map(|l| l.text())).collect();
        assert_eq!(texts, vec!["Item", "Qty", "Price"]);
    }

    #[test]
    fn test_paragraph_lines_share_block() {
        let runs = vec![
            run("first line", 72.0, 122.0, 700.0),
            run("second line", 72.0, 127.0, 688.0),
            run("far below", 72.0, 117.0, 500.0),
        ];
        let blocks = assemble_blocks(&runs, &PageBox::LETTER, settings());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 2);
    }
}
