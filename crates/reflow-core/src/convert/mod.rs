//! Format converters. Each function here is one strategy of a fallback chain.

pub mod derived;
pub mod html;
pub mod image;
pub mod layout;
pub mod postprocess;
pub mod reconstruct;
pub mod simple;
pub mod slides;
pub mod structural;
pub mod text;

pub use image::{FormatGroup, ImageExport, ImageSettings, ImageTarget};
pub use slides::SlideChunk;
pub use structural::{ExecutionMode, LayoutEngine, StructuralEngine};
