//! Page layout analysis: tables, paragraphs and pictures in reading order.

use std::cmp::Ordering;

use crate::models::config::LayoutConfig;
use crate::models::{BBox, ImageBlock, PositionedContentItem, TextRun};
use crate::writers::CellText;

/// A grid of cells found from aligned text.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub bbox: BBox,
    pub rows: Vec<Vec<CellText>>,
}

impl DetectedTable {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// One unit of page content in reading order.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBlock {
    Paragraph(TextRun),
    Table(DetectedTable),
    Image(ImageBlock),
}

impl PageBlock {
    pub fn top(&self) -> f32 {
        match self {
            Self::Paragraph(run) => run.bbox.y0,
            Self::Table(table) => table.bbox.y0,
            Self::Image(image) => image.bbox.y0,
        }
    }

    pub fn bottom(&self) -> f32 {
        match self {
            Self::Paragraph(run) => run.bbox.y1,
            Self::Table(table) => table.bbox.y1,
            Self::Image(image) => image.bbox.y1,
        }
    }
}

/// Runs sharing a visual row, left to right.
fn group_rows<'a>(runs: &[&'a TextRun], tolerance: f32) -> Vec<Vec<&'a TextRun>> {
    let mut sorted: Vec<&TextRun> = runs.to_vec();
    sorted.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    let mut rows: Vec<Vec<&TextRun>> = Vec::new();
    for run in sorted {
        match rows.last_mut() {
            Some(row) if (run.bbox.y0 - row[0].bbox.y0).abs() <= tolerance => row.push(run),
            _ => rows.push(vec![run]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
    }
    rows
}

fn anchor_of(anchors: &[f32], x: f32, tolerance: f32) -> Option<usize> {
    anchors
        .iter()
        .enumerate()
        .filter(|(_, a)| (**a - x).abs() <= tolerance)
        .min_by(|a, b| (a.1 - x).abs().partial_cmp(&(b.1 - x).abs()).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Whether a row continues a table with the given column anchors.
fn aligns(row: &[&TextRun], anchors: &[f32], config: &LayoutConfig) -> bool {
    let matched = row
        .iter()
        .filter(|run| anchor_of(anchors, run.bbox.x0, config.column_tolerance_pt).is_some())
        .count();
    matched >= config.min_table_columns.min(row.len()).max(2)
}

fn build_table(rows: &[Vec<&TextRun>], config: &LayoutConfig) -> DetectedTable {
    let mut anchors: Vec<f32> = Vec::new();
    for row in rows {
        for run in row {
            if anchor_of(&anchors, run.bbox.x0, config.column_tolerance_pt).is_none() {
                anchors.push(run.bbox.x0);
            }
        }
    }
    anchors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut bbox = rows[0][0].bbox;
    let grid = rows
        .iter()
        .map(|row| {
            let mut cells = vec![CellText { text: String::new(), bold: false }; anchors.len()];
            for run in row {
                bbox = bbox.union(&run.bbox);
                let column = anchor_of(&anchors, run.bbox.x0, config.column_tolerance_pt).unwrap_or(0);
                let cell = &mut cells[column];
                if !cell.text.is_empty() {
                    cell.text.push(' ');
                }
                cell.text.push_str(run.text.trim());
                cell.bold |= run.bold;
            }
            cells
        })
        .collect();

    DetectedTable { bbox, rows: grid }
}

/// Split a page into tables, paragraphs and pictures ordered top to bottom.
///
/// A table is a run of at least `min_table_rows` consecutive rows, each with
/// at least `min_table_columns` cells, whose left edges line up.
pub fn analyze_page(items: &[PositionedContentItem], config: &LayoutConfig) -> Vec<PageBlock> {
    let runs: Vec<&TextRun> = items.iter().filter_map(PositionedContentItem::as_text).collect();
    let rows = group_rows(&runs, config.row_tolerance_pt);
    let min_columns = config.min_table_columns.max(2);

    let mut blocks: Vec<PageBlock> = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        if rows[i].len() >= min_columns {
            let mut anchors: Vec<f32> = rows[i].iter().map(|r| r.bbox.x0).collect();
            let mut end = i + 1;
            while end < rows.len() && rows[end].len() >= min_columns && aligns(&rows[end], &anchors, config) {
                anchors.extend(rows[end].iter().map(|r| r.bbox.x0));
                end += 1;
            }
            if end - i >= config.min_table_rows.max(1) {
                blocks.push(PageBlock::Table(build_table(&rows[i..end], config)));
                i = end;
                continue;
            }
        }
        blocks.extend(rows[i].iter().map(|run| PageBlock::Paragraph((*run).clone())));
        i += 1;
    }

    blocks.extend(
        items
            .iter()
            .filter_map(PositionedContentItem::as_image)
            .map(|image| PageBlock::Image(image.clone())),
    );
    blocks.sort_by(|a, b| a.top().partial_cmp(&b.top()).unwrap_or(Ordering::Equal));
    blocks
}

/// Tables found on a page, top to bottom.
pub fn detect_tables(items: &[PositionedContentItem], config: &LayoutConfig) -> Vec<DetectedTable> {
    analyze_page(items, config)
        .into_iter()
        .filter_map(|block| match block {
            PageBlock::Table(table) => Some(table),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(x0: f32, y0: f32, text: &str, bold: bool) -> PositionedContentItem {
        PositionedContentItem::Text(TextRun {
            text: text.to_string(),
            bbox: BBox::new(x0, y0, x0 + 6.0 * text.len() as f32, y0 + 12.0),
            font_size: 12.0,
            font_name: "Helvetica".to_string(),
            bold,
            italic: false,
            page_index: 0,
        })
    }

    fn texts(table: &DetectedTable) -> Vec<Vec<&str>> {
        table.rows.iter().map(|r| r.iter().map(|c| c.text.as_str()).collect()).collect()
    }

    #[test]
    fn test_detects_aligned_rows() {
        let items = vec![
            run(72.0, 50.0, "Invoice 42", true),
            run(72.0, 100.0, "Item", true),
            run(172.0, 100.0, "Qty", true),
            run(272.0, 100.0, "Price", true),
            run(72.0, 120.0, "Pen", false),
            run(174.0, 120.0, "3", false),
            run(270.0, 120.0, "1.50", false),
            run(72.0, 140.0, "Book", false),
            run(172.0, 140.0, "1", false),
            run(272.0, 140.0, "9.99", false),
            run(72.0, 200.0, "Thank you", false),
        ];
        let blocks = analyze_page(&items, &LayoutConfig::default());

        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], PageBlock::Paragraph(r) if r.text == "Invoice 42"));
        let PageBlock::Table(table) = &blocks[1] else {
            panic!("expected a table, got {:?}", blocks[1]);
        };
        assert_eq!(
            texts(table),
            vec![vec!["Item", "Qty", "Price"], vec!["Pen", "3", "1.50"], vec!["Book", "1", "9.99"]]
        );
        assert!(table.rows[0][0].bold);
        assert!(matches!(&blocks[2], PageBlock::Paragraph(r) if r.text == "Thank you"));
    }

    #[test]
    fn test_single_multi_cell_row_is_not_a_table() {
        let items = vec![run(72.0, 100.0, "Name:", true), run(200.0, 100.0, "Jane", false)];
        let blocks = analyze_page(&items, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert!(detect_tables(&items, &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn test_misaligned_rows_break_table() {
        let items = vec![
            run(72.0, 100.0, "a", false),
            run(172.0, 100.0, "b", false),
            run(72.0, 120.0, "c", false),
            run(172.0, 120.0, "d", false),
            run(400.0, 140.0, "x", false),
            run(500.0, 140.0, "y", false),
        ];
        let tables = detect_tables(&items, &LayoutConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(texts(&tables[0]), vec![vec!["a", "b"], vec!["c", "d"]]);
    }
}
