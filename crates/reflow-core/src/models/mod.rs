//! Data models for the conversion pipeline.

pub mod config;
pub mod content;

pub use config::ReflowConfig;
pub use content::{BBox, ImageBlock, PositionedContentItem, TextRun};
