//! Output format writers.

pub mod docx;
pub mod ooxml;
pub mod pptx;
pub mod xlsx;

pub use docx::{CellText, DocxBuilder, RunStyle};
pub use pptx::{DeckBuilder, SlideContent, SlideParagraph, SlidePicture};
pub use xlsx::StyleBook;
