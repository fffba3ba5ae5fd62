//! Coordinate-to-cell mapping and the intermediate sheet model.
//!
//! Page content is placed on a grid where one column spans
//! `points_per_column` points and one row spans `points_per_row` points.
//! Pages are stacked vertically, separated by a labelled marker row.

use std::collections::BTreeMap;

use tracing::debug;

use crate::heuristics::HeaderHeuristic;
use crate::models::config::GridConfig;
use crate::models::{BBox, PositionedContentItem};

/// A 1-based cell position. Orders by row, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub column: u16,
}

impl CellAddress {
    pub fn new(row: u32, column: u16) -> Self {
        Self { row, column }
    }

    /// Zero-based `(row, column)` as used by spreadsheet writers.
    pub fn zero_based(&self) -> (u32, u16) {
        (self.row.saturating_sub(1), self.column.saturating_sub(1))
    }
}

/// Map a bounding box to its cell, with rows counted from `base_row`.
pub fn cell_address(bbox: &BBox, base_row: u32, grid: &GridConfig) -> CellAddress {
    let column = ((bbox.x0.max(0.0) / grid.points_per_column).floor() as i64 + 1)
        .clamp(1, grid.max_columns.max(1) as i64) as u16;
    let row = base_row + (bbox.y0.max(0.0) / grid.points_per_row).floor() as u32;
    CellAddress { row, column }
}

/// What a cell means to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    Data,
    Header,
    /// The `=== PAGE n ===` marker between pages. Never data.
    PageSeparator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetCell {
    pub text: String,
    pub role: CellRole,
}

/// An image anchored at a cell, with its display size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetImage {
    pub address: CellAddress,
    pub png: Vec<u8>,
    pub source_width_px: u32,
    pub source_height_px: u32,
    pub display_width_px: u32,
    pub display_height_px: u32,
}

/// Cells and images of one worksheet before serialization.
#[derive(Debug, Clone, Default)]
pub struct SheetModel {
    pub name: String,
    cells: BTreeMap<CellAddress, SheetCell>,
    pub images: Vec<SheetImage>,
}

impl SheetModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Write a cell, joining with a space when it is already occupied.
    pub fn append(&mut self, address: CellAddress, text: &str, role: CellRole) {
        self.cells
            .entry(address)
            .and_modify(|cell| {
                cell.text.push(' ');
                cell.text.push_str(text);
            })
            .or_insert_with(|| SheetCell { text: text.to_string(), role });
    }

    pub fn set(&mut self, address: CellAddress, text: impl Into<String>, role: CellRole) {
        self.cells.insert(address, SheetCell { text: text.into(), role });
    }

    pub fn cell(&self, row: u32, column: u16) -> Option<&SheetCell> {
        self.cells.get(&CellAddress::new(row, column))
    }

    /// Cells in `(row, column)` order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellAddress, &SheetCell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.images.is_empty()
    }

    /// Last occupied row, counting images. Zero when empty.
    pub fn max_row(&self) -> u32 {
        let cells = self.cells.keys().map(|a| a.row).max().unwrap_or(0);
        let images = self.images.iter().map(|i| i.address.row).max().unwrap_or(0);
        cells.max(images)
    }

    pub fn max_column(&self) -> u16 {
        self.cells.keys().map(|a| a.column).max().unwrap_or(0)
    }

    /// Distinct occupied rows in ascending order.
    pub fn rows(&self) -> Vec<u32> {
        let mut rows: Vec<u32> = self.cells.keys().map(|a| a.row).collect();
        rows.dedup();
        rows
    }

    /// Cells of one row, left to right.
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (&CellAddress, &SheetCell)> {
        self.cells
            .range(CellAddress::new(row, 0)..=CellAddress::new(row, u16::MAX))
    }

    /// Text of a row's cells joined by spaces.
    pub fn row_text(&self, row: u32) -> String {
        self.row_cells(row)
            .map(|(_, cell)| cell.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn row_role(&self, row: u32) -> Option<CellRole> {
        self.row_cells(row).next().map(|(_, cell)| cell.role)
    }

    /// Change the role of every cell in a row.
    pub fn mark_row(&mut self, row: u32, role: CellRole) {
        for (_, cell) in self
            .cells
            .range_mut(CellAddress::new(row, 0)..=CellAddress::new(row, u16::MAX))
        {
            cell.role = role;
        }
    }

    /// Open an empty row at `at`, moving that row and everything below it down one.
    pub fn insert_row(&mut self, at: u32) {
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .map(|(mut address, cell)| {
                if address.row >= at {
                    address.row += 1;
                }
                (address, cell)
            })
            .collect();
        for image in &mut self.images {
            if image.address.row >= at {
                image.address.row += 1;
            }
        }
    }
}

/// Display size of an embedded image: proportional to its source width, with a floor.
pub fn image_display_size(bbox: &BBox, grid: &GridConfig) -> (u32, u32) {
    let width = (bbox.width() * grid.image_px_per_point).round().max(grid.min_image_width_px as f32);
    let height = if bbox.width() > 0.0 {
        width * bbox.height() / bbox.width()
    } else {
        0.0
    };
    (width as u32, (height.round() as u32).max(grid.min_image_height_px))
}

/// Place every page's items on one sheet and apply the header heuristic.
///
/// Items of a page are sorted by `(row, column)` before placement. Pages after
/// the first start two rows below the previous content, after a separator row.
pub fn build_sheet_model(
    name: &str,
    pages: &[Vec<PositionedContentItem>],
    grid: &GridConfig,
    heuristic: &dyn HeaderHeuristic,
) -> SheetModel {
    let mut sheet = SheetModel::new(name);

    for (page_number, items) in pages.iter().enumerate().map(|(i, items)| (i + 1, items)) {
        let base_row = if page_number == 1 {
            1
        } else {
            let separator_row = sheet.max_row() + 2;
            sheet.set(
                CellAddress::new(separator_row, 1),
                format!("=== PAGE {} ===", page_number),
                CellRole::PageSeparator,
            );
            separator_row + 1
        };

        let mut placed: Vec<(CellAddress, f32, &PositionedContentItem)> = items
            .iter()
            .map(|item| (cell_address(item.bbox(), base_row, grid), item.bbox().x0, item))
            .collect();
        placed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        for (address, _, item) in placed {
            match item {
                PositionedContentItem::Text(run) => {
                    sheet.append(address, run.text.trim(), CellRole::Data);
                }
                PositionedContentItem::Image(image) => {
                    let (display_width_px, display_height_px) = image_display_size(&image.bbox, grid);
                    sheet.images.push(SheetImage {
                        address,
                        png: image.raw_bytes.clone(),
                        source_width_px: image.width_px,
                        source_height_px: image.height_px,
                        display_width_px,
                        display_height_px,
                    });
                }
            }
        }
        debug!("Placed page {} starting at row {}", page_number, base_row);
    }

    heuristic.apply(&mut sheet);
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::{FirstRowHeader, NoHeader};
    use crate::models::{ImageBlock, TextRun};
    use pretty_assertions::assert_eq;

    fn text(x0: f32, y0: f32, s: &str) -> PositionedContentItem {
        PositionedContentItem::Text(TextRun {
            text: s.to_string(),
            bbox: BBox::new(x0, y0, x0 + 30.0, y0 + 12.0),
            font_size: 12.0,
            font_name: "Helvetica".to_string(),
            bold: false,
            italic: false,
            page_index: 0,
        })
    }

    #[test]
    fn test_cell_address_mapping() {
        let grid = GridConfig::default();
        assert_eq!(cell_address(&BBox::new(0.0, 0.0, 1.0, 1.0), 1, &grid), CellAddress::new(1, 1));
        assert_eq!(cell_address(&BBox::new(72.0, 39.9, 80.0, 50.0), 1, &grid), CellAddress::new(2, 2));
        assert_eq!(cell_address(&BBox::new(-5.0, 0.0, 1.0, 1.0), 10, &grid), CellAddress::new(10, 1));
        assert_eq!(cell_address(&BBox::new(5000.0, 100.0, 5010.0, 110.0), 1, &grid), CellAddress::new(6, 15));
    }

    #[test]
    fn test_collisions_concatenate_in_reading_order() {
        let pages = vec![vec![text(40.0, 10.0, "world"), text(5.0, 12.0, "hello")]];
        let sheet = build_sheet_model("Sheet1", &pages, &GridConfig::default(), &NoHeader);

        assert_eq!(sheet.cell_count(), 1);
        assert_eq!(sheet.cell(1, 1).unwrap().text, "hello world");
    }

    #[test]
    fn test_page_separator_rows() {
        let pages = vec![
            vec![text(0.0, 0.0, "a"), text(0.0, 45.0, "b")],
            vec![text(0.0, 0.0, "c")],
        ];
        let sheet = build_sheet_model("Sheet1", &pages, &GridConfig::default(), &NoHeader);

        assert_eq!(sheet.cell(3, 1).unwrap().text, "b");
        let separator = sheet.cell(5, 1).unwrap();
        assert_eq!(separator.text, "=== PAGE 2 ===");
        assert_eq!(separator.role, CellRole::PageSeparator);
        assert_eq!(sheet.cell(6, 1).unwrap().text, "c");
    }

    #[test]
    fn test_first_row_header_role() {
        let pages = vec![vec![text(0.0, 0.0, "Item"), text(80.0, 0.0, "Qty"), text(0.0, 20.0, "Pen")]];
        let sheet = build_sheet_model("Sheet1", &pages, &GridConfig::default(), &FirstRowHeader);

        assert_eq!(sheet.row_role(1), Some(CellRole::Header));
        assert_eq!(sheet.row_role(2), Some(CellRole::Data));
    }

    #[test]
    fn test_image_display_size() {
        let grid = GridConfig::default();
        assert_eq!(image_display_size(&BBox::new(0.0, 0.0, 100.0, 50.0), &grid), (1000, 500));
        assert_eq!(image_display_size(&BBox::new(0.0, 0.0, 4.0, 1.0), &grid), (80, 40));

        let pages = vec![vec![PositionedContentItem::Image(ImageBlock {
            raw_bytes: vec![1, 2, 3],
            width_px: 10,
            height_px: 5,
            bbox: BBox::new(150.0, 60.0, 250.0, 110.0),
            page_index: 0,
        })]];
        let sheet = build_sheet_model("Sheet1", &pages, &grid, &NoHeader);
        assert_eq!(sheet.images[0].address, CellAddress::new(4, 3));
        assert_eq!(sheet.max_row(), 4);
    }

    #[test]
    fn test_insert_row_shifts_cells_and_images() {
        let mut sheet = SheetModel::new("s");
        sheet.set(CellAddress::new(1, 1), "keep", CellRole::Data);
        sheet.set(CellAddress::new(2, 1), "move", CellRole::Data);
        sheet.images.push(SheetImage {
            address: CellAddress::new(3, 2),
            png: Vec::new(),
            source_width_px: 1,
            source_height_px: 1,
            display_width_px: 80,
            display_height_px: 40,
        });

        sheet.insert_row(2);

        assert_eq!(sheet.cell(1, 1).unwrap().text, "keep");
        assert!(sheet.cell(2, 1).is_none());
        assert_eq!(sheet.cell(3, 1).unwrap().text, "move");
        assert_eq!(sheet.images[0].address.row, 4);
    }
}
