//! PDF processing module.
//!
//! [`PdfProcessor`] is the collaborator contract every converter reads pages
//! through. Coordinates are PDF points with the origin at the top-left corner
//! of the page, page indices are 0-based.

mod content;
mod extractor;
mod fonts;
mod lines;
#[cfg(feature = "mupdf")]
mod mupdf_renderer;
mod render;
mod stext;

pub use extractor::LopdfProcessor;
#[cfg(feature = "mupdf")]
pub use mupdf_renderer::MupdfProcessor;

use image::DynamicImage;

use crate::error::PdfError;
use crate::models::config::LayoutConfig;
use crate::models::BBox;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Page size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub width: f32,
    pub height: f32,
}

/// A run of text sharing one font.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_name: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub bbox: BBox,
}

/// Spans sharing a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub bbox: BBox,
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    /// Concatenated span text.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Vertically adjacent lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub bbox: BBox,
    pub lines: Vec<TextLine>,
}

/// An image extracted from a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    /// PNG-encoded image data.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Placement on the page.
    pub bbox: BBox,
}

/// Trait for PDF processing implementations.
pub trait PdfProcessor: Send + Sync {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Number of pages in the loaded PDF.
    fn page_count(&self) -> usize;

    /// Size of a page.
    fn page_rect(&self, index: usize) -> Result<PageRect>;

    /// Text of a page grouped into blocks, lines and spans, in reading order.
    fn page_text_blocks(&self, index: usize) -> Result<Vec<TextBlock>>;

    /// Raster images drawn on a page.
    fn page_images(&self, index: usize) -> Result<Vec<ExtractedImage>>;

    /// Rasterize a page. A zoom of 1.0 yields one pixel per point.
    fn render_page(&self, index: usize, zoom: f32) -> Result<DynamicImage>;

    /// Plain text of the whole document.
    fn extract_text(&self) -> Result<String>;
}

/// Open a PDF with the best processor compiled into this build.
pub fn open(data: &[u8], layout: &LayoutConfig) -> Result<Box<dyn PdfProcessor>> {
    #[cfg(feature = "mupdf")]
    let mut processor = MupdfProcessor::new().with_layout(layout);
    #[cfg(not(feature = "mupdf"))]
    let mut processor = LopdfProcessor::new().with_layout(layout);

    processor.load(data)?;
    Ok(Box::new(processor))
}

/// Whether pages are rasterized by MuPDF in this build.
pub fn has_full_renderer() -> bool {
    cfg!(feature = "mupdf")
}

#[cfg(test)]
pub(crate) mod testing;
