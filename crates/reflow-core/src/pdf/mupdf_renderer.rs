//! MuPDF-backed processor.
//!
//! Text positions and page rasters come from MuPDF. Its structured text has
//! no font names, so span styles and embedded images are still read through
//! [`LopdfProcessor`].

use image::{DynamicImage, RgbaImage};
use mupdf::{Colorspace, Document, Matrix, TextPageOptions};
use tracing::{debug, warn};

use super::stext::{assemble_block, assemble_line, Glyph};
use super::{ExtractedImage, LopdfProcessor, PageRect, PdfProcessor, Result, TextBlock, TextSpan};
use crate::error::PdfError;
use crate::models::config::LayoutConfig;
use crate::models::BBox;

fn mupdf_err(e: mupdf::error::Error) -> PdfError {
    PdfError::Render(e.to_string())
}

/// PDF processor that renders with MuPDF.
pub struct MupdfProcessor {
    inner: LopdfProcessor,
    data: Vec<u8>,
}

impl MupdfProcessor {
    pub fn new() -> Self {
        Self { inner: LopdfProcessor::new(), data: Vec::new() }
    }

    /// Use the line grouping tolerances from a layout configuration.
    pub fn with_layout(mut self, layout: &LayoutConfig) -> Self {
        self.inner = self.inner.with_layout(layout);
        self
    }
}

impl MupdfProcessor {
    // mupdf documents are not Sync; open one per call
    fn open(&self) -> Result<Document> {
        Document::from_bytes(&self.data, "application/pdf").map_err(mupdf_err)
    }

    fn structured_blocks(&self, index: usize, styles: &[TextSpan]) -> Result<Vec<TextBlock>> {
        let doc = self.open()?;
        let page = doc.load_page(index as i32).map_err(mupdf_err)?;
        let text_page = page
            .to_text_page(TextPageOptions::PRESERVE_WHITESPACE)
            .map_err(mupdf_err)?;

        let mut blocks = Vec::new();
        for block in text_page.blocks() {
            let lines = block
                .lines()
                .filter_map(|line| {
                    let glyphs: Vec<Glyph> = line
                        .chars()
                        .filter_map(|ch| {
                            let c = ch.char()?;
                            let quad = ch.quad();
                            let bbox = BBox::new(
                                quad.ul.x.min(quad.ll.x),
                                quad.ul.y.min(quad.ur.y),
                                quad.ur.x.max(quad.lr.x),
                                quad.ll.y.max(quad.lr.y),
                            );
                            Some(Glyph { ch: c, bbox, size: ch.size() })
                        })
                        .collect();
                    assemble_line(&glyphs, styles)
                })
                .collect();
            blocks.extend(assemble_block(lines));
        }
        Ok(blocks)
    }
}

impl Default for MupdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for MupdfProcessor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        self.inner.load(data)?;
        self.data = data.to_vec();
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn page_rect(&self, index: usize) -> Result<PageRect> {
        self.inner.page_rect(index)
    }

    fn page_text_blocks(&self, index: usize) -> Result<Vec<TextBlock>> {
        let reference = self.inner.page_text_blocks(index)?;
        let styles: Vec<TextSpan> = reference
            .iter()
            .flat_map(|b| &b.lines)
            .flat_map(|l| l.spans.iter().cloned())
            .collect();

        match self.structured_blocks(index, &styles) {
            Ok(blocks) => {
                debug!("Page {}: {} structured text blocks from MuPDF", index, blocks.len());
                Ok(blocks)
            }
            Err(e) => {
                warn!("MuPDF text failed on page {}, using content stream text: {}", index, e);
                Ok(reference)
            }
        }
    }

    fn page_images(&self, index: usize) -> Result<Vec<ExtractedImage>> {
        self.inner.page_images(index)
    }

    fn render_page(&self, index: usize, zoom: f32) -> Result<DynamicImage> {
        let doc = self.open()?;
        let page = doc.load_page(index as i32).map_err(mupdf_err)?;
        let matrix = Matrix::new_scale(zoom, zoom);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)
            .map_err(mupdf_err)?;

        let width = pixmap.width() as u32;
        let height = pixmap.height() as u32;
        let samples = pixmap.samples();
        let n = pixmap.n() as usize;

        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for px in samples.chunks(n.max(1)).take((width * height) as usize) {
            let r = px.first().copied().unwrap_or(255);
            let g = px.get(1).copied().unwrap_or(r);
            let b = px.get(2).copied().unwrap_or(r);
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
        debug!("Rendered page {} at {}x{} with MuPDF", index, width, height);

        RgbaImage::from_raw(width, height, rgba)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| PdfError::Render("pixmap size mismatch".to_string()))
    }

    fn extract_text(&self) -> Result<String> {
        let doc = self.open()?;
        let mut text = String::new();
        for index in 0..self.page_count() {
            let page = doc.load_page(index as i32).map_err(mupdf_err)?;
            let text_page = page.to_text_page(TextPageOptions::empty()).map_err(mupdf_err)?;
            for block in text_page.blocks() {
                for line in block.lines() {
                    text.extend(line.chars().filter_map(|ch| ch.char()));
                    text.push('\n');
                }
            }
        }
        Ok(text)
    }
}
