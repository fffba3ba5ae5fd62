//! Positioned content extracted from PDF pages.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in PDF points, origin at the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether the horizontal extents overlap.
    pub fn overlaps_x(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1
    }
}

/// One line of text with the font metadata of its first span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub page_index: usize,
}

/// An embedded raster image and where it sits on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    /// PNG-encoded pixels.
    pub raw_bytes: Vec<u8>,
    /// Pixel width of the decoded image.
    pub width_px: u32,
    /// Pixel height of the decoded image.
    pub height_px: u32,
    pub bbox: BBox,
    pub page_index: usize,
}

/// A normalized unit of page content.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionedContentItem {
    Text(TextRun),
    Image(ImageBlock),
}

impl PositionedContentItem {
    pub fn bbox(&self) -> &BBox {
        match self {
            Self::Text(run) => &run.bbox,
            Self::Image(image) => &image.bbox,
        }
    }

    pub fn as_text(&self) -> Option<&TextRun> {
        match self {
            Self::Text(run) => Some(run),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlock> {
        match self {
            Self::Image(image) => Some(image),
            Self::Text(_) => None,
        }
    }
}
