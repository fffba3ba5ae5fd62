//! Page compositor used when no full rasterizer is compiled in.
//!
//! Draws embedded images at their placement and greeks text as grey bars
//! along each span's baseline. Good enough for previews and slide fallbacks,
//! not for print.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::trace;

use super::{ExtractedImage, PageRect, TextBlock};

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([96, 96, 96, 255]);

/// Largest canvas edge in pixels.
const MAX_EDGE: f32 = 12_000.0;

pub(crate) fn compose_page(
    rect: PageRect,
    zoom: f32,
    images: &[ExtractedImage],
    blocks: &[TextBlock],
) -> DynamicImage {
    let zoom = zoom.max(0.01).min(MAX_EDGE / rect.width.max(rect.height).max(1.0));
    let width = ((rect.width * zoom).round() as u32).max(1);
    let height = ((rect.height * zoom).round() as u32).max(1);
    let mut canvas = RgbaImage::from_pixel(width, height, PAPER);

    for image in images {
        let Ok(decoded) = image::load_from_memory(&image.data) else {
            trace!("Skipping undecodable image on composite");
            continue;
        };
        let w = ((image.bbox.width() * zoom).round() as u32).max(1);
        let h = ((image.bbox.height() * zoom).round() as u32).max(1);
        let scaled = decoded.resize_exact(w, h, FilterType::Triangle).to_rgba8();
        imageops::overlay(
            &mut canvas,
            &scaled,
            (image.bbox.x0 * zoom).round() as i64,
            (image.bbox.y0 * zoom).round() as i64,
        );
    }

    for span in blocks.iter().flat_map(|b| &b.lines).flat_map(|l| &l.spans) {
        if span.text.trim().is_empty() {
            continue;
        }
        // x-height band sitting on the baseline
        let baseline = span.bbox.y1 - span.size * 0.2;
        let top = baseline - span.size * 0.5;
        fill_rect(
            &mut canvas,
            span.bbox.x0 * zoom,
            top * zoom,
            span.bbox.x1 * zoom,
            baseline * zoom,
        );
    }

    DynamicImage::ImageRgba8(canvas)
}

fn fill_rect(canvas: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32) {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let x0 = x0.clamp(0.0, w) as u32;
    let x1 = x1.clamp(0.0, w) as u32;
    let y0 = y0.clamp(0.0, h) as u32;
    let y1 = (y1.clamp(0.0, h) as u32).max(y0 + 1).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, INK);
        }
    }
}
