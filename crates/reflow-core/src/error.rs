//! Error types for the reflow-core library.

use std::fmt;

use thiserror::Error;

use crate::orchestrator::ConversionAttempt;

/// Main error type for the reflow library.
#[derive(Error, Debug)]
pub enum ReflowError {
    /// An optional library or external tool is not available.
    #[error("missing dependency {dependency}: {detail}")]
    MissingDependency { dependency: String, detail: String },

    /// The input PDF could not be read.
    #[error("failed to read source PDF: {0}")]
    SourceRead(#[from] PdfError),

    /// A single conversion strategy failed.
    #[error("strategy '{strategy}' failed: {reason}")]
    StrategyFailure { strategy: String, reason: String },

    /// A strategy reported success but produced no usable output.
    #[error("strategy '{strategy}' produced unusable output: {reason}")]
    OutputVerification { strategy: String, reason: String },

    /// Every strategy for the requested format failed.
    #[error("all strategies for {format} failed: {}", AttemptList(.attempts))]
    TotalConversionFailure {
        format: String,
        attempts: Vec<ConversionAttempt>,
    },

    /// Output writer error.
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown target or image format name.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl ReflowError {
    /// Shorthand for a strategy failure.
    pub fn strategy(strategy: impl Into<String>, reason: impl ToString) -> Self {
        Self::StrategyFailure {
            strategy: strategy.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a missing optional dependency.
    pub fn missing(dependency: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MissingDependency {
            dependency: dependency.into(),
            detail: detail.into(),
        }
    }

    /// Whether a fallback chain may swallow this error and try the next strategy.
    /// Page-level read failures are; an unparseable document is not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SourceRead(e) => !e.is_document_level(),
            Self::TotalConversionFailure { .. } | Self::UnsupportedFormat(_) => false,
            _ => true,
        }
    }
}

struct AttemptList<'a>(&'a [ConversionAttempt]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(
                f,
                "{}: {}",
                attempt.strategy_name,
                attempt.error.as_deref().unwrap_or("ok")
            )?;
        }
        Ok(())
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to extract images from PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// Failed to rasterize a page.
    #[error("failed to render page: {0}")]
    Render(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page index requested.
    #[error("invalid page index: {0}")]
    InvalidPage(usize),
}

impl PdfError {
    /// Whether the whole document is unreadable, rather than one page or resource.
    pub fn is_document_level(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Encrypted | Self::NoPages)
    }
}

/// Errors raised while serializing an output format.
#[derive(Error, Debug)]
pub enum WriterError {
    /// Editable document packaging failed.
    #[error("document: {0}")]
    Document(String),

    /// Spreadsheet writer failed.
    #[error("spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// ZIP container read or write failed.
    #[error("archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// XML event stream could not be read or written.
    #[error("xml: {0}")]
    Xml(String),

    /// Slide deck assembly failed.
    #[error("slides: {0}")]
    Slides(String),
}

impl From<quick_xml::Error> for WriterError {
    fn from(e: quick_xml::Error) -> Self {
        WriterError::Xml(e.to_string())
    }
}

/// Result type for the reflow library.
pub type Result<T> = std::result::Result<T, ReflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_failure_lists_attempts() {
        let err = ReflowError::TotalConversionFailure {
            format: "word".to_string(),
            attempts: vec![
                ConversionAttempt::failed("structural", "engine disabled"),
                ConversionAttempt::failed("reconstruct", "no pages"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("structural: engine disabled"));
        assert!(msg.contains("reconstruct: no pages"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ReflowError::missing("mupdf", "feature disabled").is_recoverable());
        assert!(ReflowError::strategy("raster", "boom").is_recoverable());
        assert!(!ReflowError::SourceRead(PdfError::NoPages).is_recoverable());
        assert!(ReflowError::SourceRead(PdfError::InvalidPage(4)).is_recoverable());
    }
}
