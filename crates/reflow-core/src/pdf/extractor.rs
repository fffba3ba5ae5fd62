//! PDF page reading using lopdf and pdf-extract.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::content::{number, ImagePlacement, Interpreter, PageContent};
use super::lines::{assemble_blocks, LineSettings, PageBox};
use super::render::compose_page;
use super::{ExtractedImage, PageRect, PdfProcessor, Result, TextBlock};
use crate::error::PdfError;
use crate::models::config::LayoutConfig;
use crate::models::BBox;

/// PDF processor backed by lopdf.
pub struct LopdfProcessor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    page_ids: Vec<ObjectId>,
    settings: LineSettings,
}

impl LopdfProcessor {
    /// Create a new processor.
    pub fn new() -> Self {
        let layout = LayoutConfig::default();
        Self {
            document: None,
            raw_data: Vec::new(),
            page_ids: Vec::new(),
            settings: LineSettings {
                row_tolerance: layout.row_tolerance_pt,
                gap_factor: layout.span_gap_factor,
            },
        }
    }

    /// Use the line grouping tolerances from a layout configuration.
    pub fn with_layout(mut self, layout: &LayoutConfig) -> Self {
        self.settings = LineSettings {
            row_tolerance: layout.row_tolerance_pt,
            gap_factor: layout.span_gap_factor,
        };
        self
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or(PdfError::Parse("No document loaded".to_string()))
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids.get(index).copied().ok_or(PdfError::InvalidPage(index))
    }

    /// Page box in user space, preferring CropBox over MediaBox.
    fn page_box(&self, index: usize) -> Result<PageBox> {
        let doc = self.document()?;
        let page_id = self.page_id(index)?;

        let rect = [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .iter()
            .find_map(|key| inherited(doc, page_id, key).and_then(|o| rect_of(doc, o)))
            .ok_or_else(|| PdfError::Parse(format!("page {} has no MediaBox", index)))?;

        let (x0, y0, x1, y1) = rect;
        Ok(PageBox {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        })
    }

    fn interpret(&self, index: usize) -> Result<PageContent> {
        let doc = self.document()?;
        let page_id = self.page_id(index)?;

        let data = doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        let resources = inherited(doc, page_id, b"Resources")
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, o)| o.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        let content = Interpreter::new(doc).page(&data, &resources);
        trace!(
            "Page {}: {} text runs, {} images",
            index,
            content.runs.len(),
            content.images.len()
        );
        Ok(content)
    }

    fn blocks_from(&self, index: usize, content: &PageContent) -> Vec<TextBlock> {
        let page = self.page_box(index).unwrap_or(PageBox::LETTER);
        assemble_blocks(&content.runs, &page, self.settings)
    }

    fn images_from(&self, index: usize, placements: &[ImagePlacement]) -> Result<Vec<ExtractedImage>> {
        let doc = self.document()?;
        let page = self.page_box(index).unwrap_or(PageBox::LETTER);
        let mut images = Vec::with_capacity(placements.len());

        for placement in placements {
            let Ok(object) = doc.get_object(placement.object_id) else {
                continue;
            };
            let Some(decoded) = decode_image_object(doc, object) else {
                continue;
            };

            let (ux0, uy0, ux1, uy1) = placement.user_bounds();
            let bbox = BBox::new(ux0 - page.x, page.flip_y(uy1), ux1 - page.x, page.flip_y(uy0));

            let (width, height) = (decoded.width(), decoded.height());
            let mut data = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
                .map_err(|e| PdfError::ImageExtraction(e.to_string()))?;

            images.push(ExtractedImage { data, width, height, bbox });
        }

        debug!("Extracted {} images from page {}", images.len(), index);
        Ok(images)
    }
}

impl Default for LopdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for LopdfProcessor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads the decrypted copy
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_ids.len());
        self.page_ids = page_ids;
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_rect(&self, index: usize) -> Result<PageRect> {
        let page = self.page_box(index)?;
        if page.width <= 0.0 || page.height <= 0.0 {
            return Err(PdfError::Parse(format!("page {} has an empty box", index)));
        }
        Ok(PageRect { width: page.width, height: page.height })
    }

    fn page_text_blocks(&self, index: usize) -> Result<Vec<TextBlock>> {
        let content = self.interpret(index)?;
        Ok(self.blocks_from(index, &content))
    }

    fn page_images(&self, index: usize) -> Result<Vec<ExtractedImage>> {
        let content = self.interpret(index)?;
        self.images_from(index, &content.images)
    }

    fn render_page(&self, index: usize, zoom: f32) -> Result<DynamicImage> {
        let content = self.interpret(index)?;
        let rect = self
            .page_rect(index)
            .unwrap_or(PageRect { width: PageBox::LETTER.width, height: PageBox::LETTER.height });
        let blocks = self.blocks_from(index, &content);
        let images = self.images_from(index, &content.images)?;
        Ok(compose_page(rect, zoom, &images, &blocks))
    }

    fn extract_text(&self) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        Ok(text)
    }
}

/// Look up a page attribute, following the Parent chain for inheritable keys.
fn inherited<'d>(doc: &'d Document, page_id: ObjectId, key: &[u8]) -> Option<&'d Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let Ok(Object::Reference(parent_id)) = node.get(b"Parent") else {
            return None;
        };
        node = doc.get_object(*parent_id).ok()?.as_dict().ok()?;
    }
    None
}

fn rect_of(doc: &Document, obj: &Object) -> Option<(f32, f32, f32, f32)> {
    let (_, obj) = doc.dereference(obj).ok()?;
    let items = obj.as_array().ok()?;
    if items.len() < 4 {
        return None;
    }
    let n = |i: usize| doc.dereference(&items[i]).ok().and_then(|(_, o)| number(o));
    Some((n(0)?, n(1)?, n(2)?, n(3)?))
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8) as u8;

    image_from_raw(&data, width, height, color_space, bits)
}

fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize).checked_mul(height as usize)?;
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" | b"CalRGB" => 3,
        b"DeviceGray" | b"G" | b"CalGray" => 1,
        b"DeviceCMYK" | b"CMYK" => 4,
        _ => return None,
    };
    if data.len() < pixels * channels {
        trace!("Image data too short: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data[..pixels * channels].chunks_exact(channels) {
        let [r, g, b] = match *px {
            [gray] => [gray, gray, gray],
            [r, g, b] => [r, g, b],
            [c, m, y, k] => {
                let k = 255 - k as u16;
                [
                    ((255 - c as u16) * k / 255) as u8,
                    ((255 - m as u16) * k / 255) as u8,
                    ((255 - y as u16) * k / 255) as u8,
                ]
            }
            _ => return None,
        };
        rgba.extend_from_slice(&[r, g, b, 255]);
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}
