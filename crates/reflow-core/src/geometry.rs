//! Mapping of source page geometry onto target pages.

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::config::GeometryConfig;
use crate::pdf::PdfProcessor;

pub const POINTS_PER_INCH: f32 = 72.0;
pub const TWIPS_PER_INCH: f32 = 1440.0;
pub const EMU_PER_INCH: f32 = 914_400.0;

/// Target page dimensions derived from the first source page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub content_width_pt: f32,
    pub content_height_pt: f32,
    pub margin_top_in: f32,
    pub margin_bottom_in: f32,
    pub margin_left_in: f32,
    pub margin_right_in: f32,
    /// False when the source page could not be measured.
    pub measured: bool,
}

impl PageGeometry {
    fn with_margin(width_pt: f32, height_pt: f32, margin: f32, measured: bool) -> Self {
        Self {
            content_width_pt: width_pt,
            content_height_pt: height_pt,
            margin_top_in: margin,
            margin_bottom_in: margin,
            margin_left_in: margin,
            margin_right_in: margin,
            measured,
        }
    }

    /// Geometry whose page size equals the configured default page.
    pub fn fallback(config: &GeometryConfig) -> Self {
        let margin = config.active_margin();
        Self::with_margin(
            ((config.default_width_in - 2.0 * margin) * POINTS_PER_INCH).max(0.0),
            ((config.default_height_in - 2.0 * margin) * POINTS_PER_INCH).max(0.0),
            margin,
            false,
        )
    }

    pub fn content_width_in(&self) -> f32 {
        self.content_width_pt / POINTS_PER_INCH
    }

    pub fn content_height_in(&self) -> f32 {
        self.content_height_pt / POINTS_PER_INCH
    }

    pub fn page_width_in(&self) -> f32 {
        self.content_width_in() + self.margin_left_in + self.margin_right_in
    }

    pub fn page_height_in(&self) -> f32 {
        self.content_height_in() + self.margin_top_in + self.margin_bottom_in
    }

    pub fn page_width_twips(&self) -> u32 {
        inches_to_twips(self.page_width_in())
    }

    pub fn page_height_twips(&self) -> u32 {
        inches_to_twips(self.page_height_in())
    }

    /// Margins as (top, right, bottom, left) twips.
    pub fn margins_twips(&self) -> (u32, u32, u32, u32) {
        (
            inches_to_twips(self.margin_top_in),
            inches_to_twips(self.margin_right_in),
            inches_to_twips(self.margin_bottom_in),
            inches_to_twips(self.margin_left_in),
        )
    }
}

pub fn inches_to_twips(inches: f32) -> u32 {
    (inches.max(0.0) * TWIPS_PER_INCH).round() as u32
}

pub fn inches_to_emu(inches: f32) -> u32 {
    (inches.max(0.0) * EMU_PER_INCH).round() as u32
}

/// Measure page 0 and add the configured margins on every side.
///
/// Never fails: an unreadable first page yields [`PageGeometry::fallback`].
pub fn compute_page_geometry(pdf: &dyn PdfProcessor, config: &GeometryConfig) -> PageGeometry {
    match pdf.page_rect(0) {
        Ok(rect) if rect.width > 0.0 && rect.height > 0.0 => {
            let geometry =
                PageGeometry::with_margin(rect.width, rect.height, config.active_margin(), true);
            debug!(
                "PDF size: {:.2}\" x {:.2}\", target page {:.2}\" x {:.2}\"",
                geometry.content_width_in(),
                geometry.content_height_in(),
                geometry.page_width_in(),
                geometry.page_height_in()
            );
            geometry
        }
        Ok(rect) => {
            warn!("Page 0 has degenerate size {}x{}, using default page", rect.width, rect.height);
            PageGeometry::fallback(config)
        }
        Err(e) => {
            warn!("Could not measure PDF: {}, using default page", e);
            PageGeometry::fallback(config)
        }
    }
}
