//! Core library for converting PDF documents into editable formats.
//!
//! This crate provides:
//! - PDF reading (positioned text runs, images, page rasterization)
//! - Geometry and grid mapping from PDF points onto target formats
//! - Structural and coordinate-reconstruction converters for documents and spreadsheets
//! - Slide pagination under a character budget
//! - Per-format fallback chains and a format dispatcher
//! - Raster image export and lossless PDF compression

pub mod capabilities;
pub mod classify;
pub mod compress;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod grid;
pub mod heuristics;
pub mod models;
pub mod orchestrator;
pub mod pdf;
pub mod writers;

pub use capabilities::Capabilities;
pub use classify::{classify, ClassifiedCellValue, NumericClassifier, ValueClassifier};
pub use compress::{compress_pdf, CompressionReport};
pub use convert::{ImageTarget, StructuralEngine};
pub use dispatch::{convert, convert_to_path, ConversionOutput, ConversionRequest, TargetFormat};
pub use error::{PdfError, ReflowError, Result, WriterError};
pub use geometry::{compute_page_geometry, PageGeometry};
pub use heuristics::HeaderHeuristic;
pub use models::config::ReflowConfig;
pub use models::{BBox, ImageBlock, PositionedContentItem, TextRun};
pub use orchestrator::{ConversionAttempt, Orchestrator};
pub use pdf::PdfProcessor;
