//! Slide deck output: text paginated under a character budget, with a
//! whole-page raster fallback.

use std::io::Cursor;

use image::ImageFormat;
use tracing::{debug, info};

use crate::error::{ReflowError, Result};
use crate::extract::extract_page_content;
use crate::geometry::POINTS_PER_INCH;
use crate::models::config::SlideConfig;
use crate::models::{ImageBlock, PositionedContentItem, TextRun};
use crate::pdf::PdfProcessor;
use crate::writers::{DeckBuilder, SlideContent, SlideParagraph, SlidePicture};

/// Font used in place of built-in PDF fonts.
const DEFAULT_SLIDE_FONT: &str = "Calibri";

/// Lines and images destined for exactly one slide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideChunk {
    pub lines: Vec<TextRun>,
    pub images: Vec<ImageBlock>,
}

impl SlideChunk {
    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|l| l.text.chars().count()).sum()
    }
}

/// Split one page's runs into chunks of at most `config.char_budget()` characters.
///
/// A line is never split; a single line longer than the budget gets a chunk
/// of its own.
pub fn paginate(runs: &[TextRun], config: &SlideConfig) -> Vec<SlideChunk> {
    let budget = config.char_budget();
    let mut chunks = Vec::new();
    let mut current = SlideChunk::default();
    let mut chars = 0usize;

    for run in runs {
        let len = run.text.chars().count();
        if chars + len > budget && !current.lines.is_empty() {
            chunks.push(std::mem::take(&mut current));
            chars = 0;
        }
        current.lines.push(run.clone());
        chars += len;
    }
    if !current.lines.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Presentation size for a source font size.
pub fn presentation_size(source_pt: f32, config: &SlideConfig) -> f32 {
    config
        .size_steps
        .iter()
        .find(|(threshold, _)| source_pt >= *threshold)
        .map(|(_, size)| *size)
        .unwrap_or(config.base_size_pt)
}

/// Built-in and subset font names fall back to the default slide font.
pub fn presentation_font(source: &str) -> String {
    if source.is_empty() || source.contains('-') || source == "Helvetica" {
        DEFAULT_SLIDE_FONT.to_string()
    } else {
        source.to_string()
    }
}

/// Smallest band kept for pictures below the text frame.
const MIN_PICTURE_BAND_IN: f32 = 1.5;

/// Where the text frame's paragraphs end, leaving room for a picture band.
fn text_bottom_in(paragraphs: &[SlideParagraph], config: &SlideConfig) -> f32 {
    let text_height: f32 = paragraphs.iter().map(|p| p.size_pt * 1.2 / POINTS_PER_INCH).sum();
    let lowest = config.slide_height_in - config.margin_in - MIN_PICTURE_BAND_IN;
    (config.margin_in + text_height).min(lowest).max(config.margin_in)
}

/// Scale a picture to fit its slot, centered and resting on the slot's bottom.
fn fit_picture(png: Vec<u8>, aspect: f32, slot_bottom: f32, slot_height: f32, config: &SlideConfig) -> SlidePicture {
    let content_width = config.slide_width_in - 2.0 * config.margin_in;
    let mut width_in = content_width;
    let mut height_in = width_in * aspect;
    if height_in > slot_height {
        height_in = slot_height;
        width_in = height_in / aspect;
    }
    SlidePicture {
        png,
        left_in: config.margin_in + (content_width - width_in) / 2.0,
        top_in: slot_bottom - height_in,
        width_in,
        height_in,
    }
}

fn chunk_to_slide(chunk: &SlideChunk, config: &SlideConfig) -> SlideContent {
    let paragraphs: Vec<SlideParagraph> = chunk
        .lines
        .iter()
        .map(|run| SlideParagraph {
            text: run.text.clone(),
            size_pt: presentation_size(run.font_size, config),
            bold: run.bold,
            italic: run.italic,
            font: presentation_font(&run.font_name),
        })
        .collect();

    let text_bottom = text_bottom_in(&paragraphs, config);
    let slot_height = (config.slide_height_in - config.margin_in - text_bottom) / chunk.images.len().max(1) as f32;
    let pictures = chunk
        .images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let aspect = if image.width_px > 0 && image.height_px > 0 {
                image.height_px as f32 / image.width_px as f32
            } else {
                image.bbox.height().max(1.0) / image.bbox.width().max(1.0)
            };
            let slot_bottom = text_bottom + slot_height * (i + 1) as f32;
            fit_picture(image.raw_bytes.clone(), aspect, slot_bottom, slot_height, config)
        })
        .collect();

    SlideContent { paragraphs, pictures }
}

/// Chunks for every page. Images ride on the last chunk of their page.
pub fn paginate_document(pdf: &dyn PdfProcessor, config: &SlideConfig) -> Result<Vec<SlideChunk>> {
    let mut all = Vec::new();

    for index in 0..pdf.page_count() {
        let items = extract_page_content(pdf, index)?;
        let runs: Vec<TextRun> = items.iter().filter_map(PositionedContentItem::as_text).cloned().collect();
        let images: Vec<ImageBlock> = items.iter().filter_map(PositionedContentItem::as_image).cloned().collect();

        let mut chunks = paginate(&runs, config);
        if !images.is_empty() {
            match chunks.last_mut() {
                Some(last) => last.images = images,
                None => chunks.push(SlideChunk { lines: Vec::new(), images }),
            }
        }
        debug!("Page {}: {} slides", index + 1, chunks.len());
        all.extend(chunks);
    }
    Ok(all)
}

/// Text and image slides.
pub fn pdf_to_slides(pdf: &dyn PdfProcessor, config: &SlideConfig) -> Result<Vec<u8>> {
    let chunks = paginate_document(pdf, config)?;
    let mut deck = DeckBuilder::new(config.slide_width_in, config.slide_height_in, config.margin_in);
    for chunk in &chunks {
        deck.add_slide(chunk_to_slide(chunk, config));
    }
    info!(
        "Paginated {} pages into {} slides at {} words per slide",
        pdf.page_count(),
        deck.slide_count(),
        config.words_per_slide
    );
    Ok(deck.finish()?)
}

/// One slide per page, each a full-bleed picture of the rendered page.
pub fn pdf_to_slides_raster(pdf: &dyn PdfProcessor, config: &SlideConfig) -> Result<Vec<u8>> {
    let zoom = config.fallback_dpi as f32 / POINTS_PER_INCH;
    let mut deck = DeckBuilder::new(config.slide_width_in, config.slide_height_in, config.margin_in);

    for index in 0..pdf.page_count() {
        let page = pdf
            .render_page(index, zoom)
            .map_err(|e| ReflowError::strategy("page-images", e))?;
        let mut png = Vec::new();
        page.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        deck.add_slide(SlideContent {
            paragraphs: Vec::new(),
            pictures: vec![SlidePicture {
                png,
                left_in: 0.0,
                top_in: 0.0,
                width_in: config.slide_width_in,
                height_in: config.slide_height_in,
            }],
        });
    }
    info!("Rasterized {} pages at {} dpi", deck.slide_count(), config.fallback_dpi);
    Ok(deck.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BBox;
    use crate::pdf::testing::{word_lines, PdfBuilder, TestImage};
    use crate::pdf::LopdfProcessor;
    use crate::writers::ooxml::{part_names, read_part};

    fn run(text: String, size: f32) -> TextRun {
        TextRun {
            text,
            bbox: BBox::new(0.0, 0.0, 100.0, size),
            font_size: size,
            font_name: "Helvetica".to_string(),
            bold: false,
            italic: false,
            page_index: 0,
        }
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        let config = SlideConfig::default();
        let runs: Vec<TextRun> = (0..25).map(|_| run("x".repeat(100), 11.0)).collect();
        let chunks = paginate(&runs, &config);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.char_count() <= config.char_budget()));
        assert_eq!(chunks[2].lines.len(), 5);
    }

    #[test]
    fn test_oversized_line_gets_one_chunk() {
        let config = SlideConfig::default();
        let chunks = paginate(&[run("y".repeat(2500), 11.0)], &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_count(), 2500);

        let chunks = paginate(&[run("a".repeat(10), 11.0), run("y".repeat(2500), 11.0)], &config);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_size_map_and_font() {
        let config = SlideConfig::default();
        assert_eq!(presentation_size(24.0, &config), 32.0);
        assert_eq!(presentation_size(18.0, &config), 32.0);
        assert_eq!(presentation_size(14.0, &config), 24.0);
        assert_eq!(presentation_size(11.0, &config), 18.0);
        assert_eq!(presentation_size(8.0, &config), 16.0);
        assert_eq!(presentation_font("Helvetica-Bold"), "Calibri");
        assert_eq!(presentation_font("Helvetica"), "Calibri");
        assert_eq!(presentation_font("Georgia"), "Georgia");
    }

    #[test]
    fn test_ten_pages_of_three_hundred_words() {
        let mut builder = PdfBuilder::new(612.0, 792.0);
        for page in 0..10 {
            if page > 0 {
                builder = builder.new_page();
            }
            let lines = word_lines(300, 12, page);
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            builder = builder.lines(72.0, 740.0, 10.0, 14.0, &refs);
        }
        let mut pdf = LopdfProcessor::new();
        pdf.load(&builder.build()).unwrap();

        let config = SlideConfig::default();
        let chunks = paginate_document(&pdf, &config).unwrap();
        assert!(chunks.len() >= 15);

        let bytes = pdf_to_slides(&pdf, &config).unwrap();
        let slides = part_names(&bytes)
            .unwrap()
            .into_iter()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .count();
        assert_eq!(slides, chunks.len());
    }

    #[test]
    fn test_images_attach_to_last_chunk() {
        let data = PdfBuilder::new(612.0, 792.0)
            .text(72.0, 700.0, 20.0, "Title")
            .image(72.0, 300.0, 100.0, 50.0, TestImage::rgb(8, 4, [0, 0, 255]))
            .new_page()
            .image(72.0, 300.0, 100.0, 50.0, TestImage::rgb(8, 4, [0, 255, 0]))
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let chunks = paginate_document(&pdf, &SlideConfig::default()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].images.len(), 1);
        assert!(chunks[1].lines.is_empty());

        let bytes = pdf_to_slides(&pdf, &SlideConfig::default()).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert!(slide.contains("Title"));
        assert!(slide.contains("sz=\"3200\""));
        assert!(slide.contains("typeface=\"Calibri\""));
    }

    fn image_block(width_px: u32, height_px: u32) -> ImageBlock {
        ImageBlock {
            raw_bytes: vec![0x89, b'P', b'N', b'G'],
            width_px,
            height_px,
            bbox: BBox::new(0.0, 0.0, width_px as f32, height_px as f32),
            page_index: 0,
        }
    }

    #[test]
    fn test_square_and_portrait_pictures_stay_on_slide() {
        let config = SlideConfig::default();
        let floor = config.slide_height_in - config.margin_in;
        let chunk = SlideChunk {
            lines: vec![run("Caption".to_string(), 20.0)],
            images: vec![image_block(100, 100), image_block(100, 300)],
        };
        let text_bottom = config.margin_in + 32.0 * 1.2 / 72.0;

        let slide = chunk_to_slide(&chunk, &config);
        assert_eq!(slide.pictures.len(), 2);
        for picture in &slide.pictures {
            assert!(picture.top_in >= text_bottom - 1e-3, "top {}", picture.top_in);
            assert!(picture.top_in + picture.height_in <= floor + 1e-3);
            assert!(picture.left_in >= config.margin_in);
            assert!(picture.left_in + picture.width_in <= config.slide_width_in - config.margin_in + 1e-3);
        }
        let square = &slide.pictures[0];
        assert!((square.width_in - square.height_in).abs() < 1e-3);
        let portrait = &slide.pictures[1];
        assert!((portrait.height_in - 3.0 * portrait.width_in).abs() < 1e-3);
        assert!((portrait.top_in + portrait.height_in - floor).abs() < 1e-3);
    }

    #[test]
    fn test_full_text_frame_keeps_picture_band() {
        let config = SlideConfig::default();
        let chunk = SlideChunk {
            lines: (0..40).map(|_| run("line".to_string(), 11.0)).collect(),
            images: vec![image_block(400, 100)],
        };

        let slide = chunk_to_slide(&chunk, &config);
        let picture = &slide.pictures[0];
        assert!(picture.height_in > 0.0);
        assert!(picture.top_in + picture.height_in <= config.slide_height_in - config.margin_in + 1e-3);
        assert!((picture.width_in - 4.0 * picture.height_in).abs() < 1e-3);
    }

    #[test]
    fn test_raster_fallback_one_picture_per_page() {
        let data = PdfBuilder::new(612.0, 792.0).text(72.0, 700.0, 12.0, "a").new_page().build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let bytes = pdf_to_slides_raster(&pdf, &SlideConfig::default()).unwrap();
        let names = part_names(&bytes).unwrap();
        assert_eq!(names.iter().filter(|n| n.starts_with("ppt/media/")).count(), 2);
    }
}
