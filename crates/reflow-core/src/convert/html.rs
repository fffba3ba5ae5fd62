//! HTML output: rendered page images, or absolutely positioned text.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::ImageFormat;
use tracing::{debug, info};

use crate::error::{ReflowError, Result};
use crate::extract::extract_page_content;
use crate::geometry::POINTS_PER_INCH;
use crate::models::PositionedContentItem;
use crate::pdf::PdfProcessor;

const PAGE_STYLE: &str = r#"<style>
* { margin: 0; padding: 0; box-sizing: border-box; }
body { background: #e0e0e0; font-family: Arial, sans-serif; padding: 20px; }
.pdf-container { max-width: 900px; margin: 0 auto; }
.pdf-page { background: white; margin: 20px 0; box-shadow: 0 2px 10px rgba(0,0,0,0.3); page-break-after: always; position: relative; }
.pdf-page img { display: block; width: 100%; height: auto; }
.page-info { text-align: center; padding: 10px; color: #666; font-size: 12px; }
.text { position: absolute; white-space: nowrap; }
@media print { body { background: white; padding: 0; } .pdf-page { margin: 0; box-shadow: none; } }
</style>
"#;

/// Escape text for element content and attribute values.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn document(body: &str) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>PDF Conversion</title>\n",
    );
    html.push_str(PAGE_STYLE);
    html.push_str("</head>\n<body>\n<div class=\"pdf-container\">\n");
    html.push_str(body);
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

/// Every page rendered at `dpi` and embedded as a base64 PNG.
pub fn pdf_to_html_raster(pdf: &dyn PdfProcessor, dpi: u32) -> Result<Vec<u8>> {
    let pages = pdf.page_count();
    let zoom = dpi as f32 / POINTS_PER_INCH;
    let mut body = String::new();

    for index in 0..pages {
        let rendered = pdf
            .render_page(index, zoom)
            .map_err(|e| ReflowError::strategy("page-images", e))?;
        let mut png = Vec::new();
        rendered.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        debug!("Page {}: {}x{} px", index + 1, rendered.width(), rendered.height());

        body.push_str(&format!(
            "  <div class=\"pdf-page\">\n    <img src=\"data:image/png;base64,{}\" alt=\"Page {}\" />\n    \
             <div class=\"page-info\">Page {} of {}</div>\n  </div>\n",
            BASE64.encode(&png),
            index + 1,
            index + 1,
            pages
        ));
    }

    info!("Embedded {} page images at {} dpi", pages, dpi);
    Ok(document(&body).into_bytes())
}

/// Text placed at its PDF coordinates, one container per page.
pub fn pdf_to_html_positioned(pdf: &dyn PdfProcessor) -> Result<Vec<u8>> {
    let mut body = String::new();
    let mut runs = 0usize;

    for index in 0..pdf.page_count() {
        let rect = pdf.page_rect(index)?;
        body.push_str(&format!(
            "  <div class=\"pdf-page\" style=\"width: {}px; height: {}px;\">\n",
            rect.width, rect.height
        ));
        for item in extract_page_content(pdf, index)? {
            let PositionedContentItem::Text(run) = item else {
                continue;
            };
            let mut style = format!(
                "left: {}px; top: {}px; font-size: {}px;",
                run.bbox.x0, run.bbox.y0, run.font_size
            );
            if run.bold {
                style.push_str(" font-weight: bold;");
            }
            if run.italic {
                style.push_str(" font-style: italic;");
            }
            body.push_str(&format!(
                "    <div class=\"text\" style=\"{}\">{}</div>\n",
                style,
                escape_html(&run.text)
            ));
            runs += 1;
        }
        body.push_str("  </div>\n");
    }

    if runs == 0 {
        return Err(ReflowError::strategy("positioned-text", "no text to place"));
    }
    Ok(document(&body).into_bytes())
}
