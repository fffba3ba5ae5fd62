//! Normalization of PDF page content into positioned items.

use tracing::{debug, warn};

use crate::error::PdfError;
use crate::models::{ImageBlock, PositionedContentItem, TextRun};
use crate::pdf::PdfProcessor;

/// Positioned items of one page.
///
/// Each text line becomes one [`TextRun`] carrying its first span's font
/// metadata. Whitespace-only lines are dropped. Images are emitted after the
/// text of the page, in drawing order.
pub fn extract_page_content(
    pdf: &dyn PdfProcessor,
    page_index: usize,
) -> Result<Vec<PositionedContentItem>, PdfError> {
    let mut items = Vec::new();

    for block in pdf.page_text_blocks(page_index)? {
        for line in &block.lines {
            let Some(first) = line.spans.first() else {
                continue;
            };
            let text = line.text();
            if text.trim().is_empty() {
                continue;
            }
            items.push(PositionedContentItem::Text(TextRun {
                text,
                bbox: line.bbox,
                font_size: first.size,
                font_name: first.font_name.clone(),
                bold: first.bold,
                italic: first.italic,
                page_index,
            }));
        }
    }

    match pdf.page_images(page_index) {
        Ok(images) => items.extend(images.into_iter().map(|image| {
            PositionedContentItem::Image(ImageBlock {
                raw_bytes: image.data,
                width_px: image.width,
                height_px: image.height,
                bbox: image.bbox,
                page_index,
            })
        })),
        Err(e) => warn!("Skipping images on page {}: {}", page_index + 1, e),
    }

    debug!("Page {}: {} content items", page_index + 1, items.len());
    Ok(items)
}

/// Text runs of one page, in extraction order.
pub fn page_text_runs(pdf: &dyn PdfProcessor, page_index: usize) -> Result<Vec<TextRun>, PdfError> {
    Ok(extract_page_content(pdf, page_index)?
        .into_iter()
        .filter_map(|item| match item {
            PositionedContentItem::Text(run) => Some(run),
            PositionedContentItem::Image(_) => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{PdfBuilder, TestImage};
    use crate::pdf::LopdfProcessor;

    #[test]
    fn test_lines_and_images() {
        let data = PdfBuilder::new(612.0, 792.0)
            .bold_text(72.0, 720.0, 18.0, "Title")
            .text(72.0, 700.0, 10.0, "   ")
            .text(72.0, 680.0, 10.0, "Body text")
            .image(72.0, 400.0, 144.0, 72.0, TestImage::rgb(3, 3, [0, 128, 0]))
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let items = extract_page_content(&pdf, 0).unwrap();
        assert_eq!(items.len(), 3);

        let title = items[0].as_text().unwrap();
        assert_eq!(title.text, "Title");
        assert!(title.bold);
        assert_eq!(title.font_size, 18.0);
        assert_eq!(title.font_name, "Helvetica-Bold");

        assert_eq!(items[1].as_text().unwrap().text, "Body text");

        let image = items[2].as_image().unwrap();
        assert_eq!(image.bbox.width(), 144.0);
        assert_eq!(image.page_index, 0);
    }

    #[test]
    fn test_mixed_formatting_keeps_first_span_style() {
        let data = PdfBuilder::new(612.0, 792.0)
            .bold_text(72.0, 700.0, 12.0, "Total:")
            .text(110.0, 700.0, 12.0, "42")
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let runs = page_text_runs(&pdf, 0).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Total: 42");
        assert!(runs[0].bold);
    }
}
