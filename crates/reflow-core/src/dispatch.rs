//! Format dispatch: request validation, orchestrator selection and output checks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::convert::image::{ImageSettings, ImageTarget};
use crate::error::{PdfError, ReflowError, Result};
use crate::models::config::{ReflowConfig, SpreadsheetPipeline};
use crate::orchestrator::{ConversionAttempt, Orchestrator};
use crate::pdf;

/// Target formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Word,
    Excel,
    Ppt,
    Html,
    Text,
    Image,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 6] = [Self::Word, Self::Excel, Self::Ppt, Self::Html, Self::Text, Self::Image];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Excel => "excel",
            Self::Ppt => "ppt",
            Self::Html => "html",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// File extension. Images depend on the image format and page selection.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Word => "docx",
            Self::Excel => "xlsx",
            Self::Ppt => "pptx",
            Self::Html => "html",
            Self::Text => "txt",
            Self::Image => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Word => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Ppt => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Self::Html => "text/html; charset=utf-8",
            Self::Text => "text/plain; charset=utf-8",
            Self::Image => "image/png",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetFormat {
    type Err = ReflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" | "docx" | "doc" => Ok(Self::Word),
            "excel" | "xlsx" | "xls" => Ok(Self::Excel),
            "ppt" | "pptx" | "powerpoint" => Ok(Self::Ppt),
            "html" | "htm" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            "image" | "images" | "img" => Ok(Self::Image),
            _ => Err(ReflowError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One conversion: the source PDF, the target and per-call overrides.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: Vec<u8>,
    /// Base name for archived image pages.
    pub stem: String,
    pub format: TargetFormat,
    pub image_format: ImageTarget,
    /// 1-based page for single-page image export.
    pub page: Option<usize>,
    pub quality: Option<u8>,
    pub dpi: Option<u32>,
    pub pipeline: Option<SpreadsheetPipeline>,
    pub words_per_slide: Option<usize>,
}

impl ConversionRequest {
    pub fn new(source: Vec<u8>, format: TargetFormat) -> Self {
        Self {
            source,
            stem: "page".to_string(),
            format,
            image_format: ImageTarget::Png,
            page: None,
            quality: None,
            dpi: None,
            pipeline: None,
            words_per_slide: None,
        }
    }

    /// Read the source from disk; the stem comes from the file name.
    pub fn from_path(path: &Path, format: TargetFormat) -> Result<Self> {
        let source = std::fs::read(path)
            .map_err(|e| PdfError::Parse(format!("cannot read {}: {}", path.display(), e)))?;
        let mut request = Self::new(source, format);
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            request.stem = stem.to_string();
        }
        Ok(request)
    }

    pub fn with_image_format(mut self, target: ImageTarget) -> Self {
        self.image_format = target;
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn with_pipeline(mut self, pipeline: SpreadsheetPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_words_per_slide(mut self, words: usize) -> Self {
        self.words_per_slide = Some(words);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(PdfError::Parse("input is empty".to_string()).into());
        }
        if let Some(quality) = self.quality
            && !(1..=100).contains(&quality)
        {
            return Err(ReflowError::Config(format!("quality {} is outside 1-100", quality)));
        }
        if self.quality.is_some() && !(self.format == TargetFormat::Image && self.image_format.is_lossy()) {
            warn!("--quality only applies to lossy image formats, ignoring it for this request");
        }
        if self.dpi == Some(0) {
            return Err(ReflowError::Config("dpi must be positive".to_string()));
        }
        if self.words_per_slide == Some(0) {
            return Err(ReflowError::Config("words per slide must be positive".to_string()));
        }
        if self.page.is_some() && self.format != TargetFormat::Image {
            warn!("--page only applies to image output, ignoring it for {}", self.format);
        }
        Ok(())
    }

    /// The base configuration with this request's overrides applied.
    fn effective_config(&self, base: &ReflowConfig) -> ReflowConfig {
        let mut config = base.clone();
        if let Some(dpi) = self.dpi {
            config.raster.html_dpi = dpi;
            config.raster.image_dpi = dpi;
            config.slides.fallback_dpi = dpi;
        }
        if let Some(quality) = self.quality {
            config.raster.quality = quality;
        }
        if let Some(pipeline) = self.pipeline {
            config.spreadsheet.pipeline = pipeline;
        }
        if let Some(words) = self.words_per_slide {
            config.slides.words_per_slide = words;
        }
        config
    }
}

/// Produced file and how it was made.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub mime_type: String,
    /// The format actually written; differs from the request after a downgrade.
    pub effective_format: String,
    /// Name of the strategy that succeeded.
    pub strategy: String,
    pub attempts: Vec<ConversionAttempt>,
}

/// Convert a request with the given configuration and capabilities.
pub fn convert(request: &ConversionRequest, config: &ReflowConfig, capabilities: &Capabilities) -> Result<ConversionOutput> {
    request.validate()?;
    let config = request.effective_config(config);
    let pdf = pdf::open(&request.source, &config.layout)?;
    info!("Converting {} pages to {}", pdf.page_count(), request.format);

    let orchestrator = Orchestrator::new(config, capabilities.clone());
    let pdf = pdf.as_ref();
    let format = request.format;

    let chain = match format {
        TargetFormat::Word => orchestrator.to_word(pdf)?,
        TargetFormat::Excel => orchestrator.to_excel(pdf)?,
        TargetFormat::Ppt => orchestrator.to_ppt(pdf)?,
        TargetFormat::Html => orchestrator.to_html(pdf)?,
        TargetFormat::Text => orchestrator.to_text(pdf)?,
        TargetFormat::Image => {
            let raster = &orchestrator.config().raster;
            let settings = ImageSettings {
                target: request.image_format,
                dpi: raster.image_dpi,
                quality: raster.quality,
                tool_timeout: std::time::Duration::from_secs(raster.tool_timeout_secs),
            };
            let chain = orchestrator.to_images(pdf, &request.stem, request.page, &settings)?;
            let export = chain.output;
            return Ok(ConversionOutput {
                bytes: export.bytes,
                extension: export.extension,
                mime_type: export.mime_type,
                effective_format: export.effective_format.extension().to_string(),
                strategy: chain.strategy.to_string(),
                attempts: chain.attempts,
            });
        }
    };

    Ok(ConversionOutput {
        bytes: chain.output,
        extension: format.extension().to_string(),
        mime_type: format.mime_type().to_string(),
        effective_format: format.name().to_string(),
        strategy: chain.strategy.to_string(),
        attempts: chain.attempts,
    })
}

/// Convert, write to `destination`, then read the file back to verify it.
pub fn convert_to_path(
    request: &ConversionRequest,
    destination: &Path,
    config: &ReflowConfig,
    capabilities: &Capabilities,
) -> Result<ConversionOutput> {
    let output = convert(request, config, capabilities)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(destination, &output.bytes)?;

    let written = std::fs::read(destination)?;
    if written.is_empty() {
        return Err(ReflowError::OutputVerification {
            strategy: output.strategy.clone(),
            reason: format!("{} is empty after writing", destination.display()),
        });
    }
    debug!("Wrote {} bytes to {}", written.len(), destination.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::SlideConfig;
    use crate::pdf::testing::PdfBuilder;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    fn invoice() -> Vec<u8> {
        PdfBuilder::new(612.0, 792.0)
            .table(10.0, 700.0, 72.0, 20.0, 11.0, &[&["Item", "Qty", "Price"], &["Pen", "3", "1.50"], &["Book", "1", "9.99"]])
            .build()
    }

    #[test]
    fn test_format_aliases() {
        assert_eq!("DOCX".parse::<TargetFormat>().unwrap(), TargetFormat::Word);
        assert_eq!("xlsx".parse::<TargetFormat>().unwrap(), TargetFormat::Excel);
        assert_eq!("pptx".parse::<TargetFormat>().unwrap(), TargetFormat::Ppt);
        assert_eq!("htm".parse::<TargetFormat>().unwrap(), TargetFormat::Html);
        assert_eq!("txt".parse::<TargetFormat>().unwrap(), TargetFormat::Text);
        assert!(matches!("odt".parse::<TargetFormat>(), Err(ReflowError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_excel_invoice_end_to_end() {
        let request = ConversionRequest::new(invoice(), TargetFormat::Excel);
        let output = convert(&request, &ReflowConfig::default(), &Capabilities::minimal()).unwrap();
        assert_eq!(output.extension, "xlsx");
        assert_eq!(output.strategy, "direct");

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(output.bytes)).unwrap();
        let range = workbook.worksheet_range("PDF to Excel").unwrap();
        let total: f64 = range
            .rows()
            .filter_map(|row| match row.get(2) {
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .sum();
        assert!((total - 11.49).abs() < 1e-9);
    }

    #[test]
    fn test_repeat_conversion_same_length() {
        let formats = [
            TargetFormat::Word,
            TargetFormat::Excel,
            TargetFormat::Ppt,
            TargetFormat::Html,
            TargetFormat::Text,
            TargetFormat::Image,
        ];
        for format in formats {
            let request = ConversionRequest::new(invoice(), format).with_dpi(36);
            let first = convert(&request, &ReflowConfig::default(), &Capabilities::minimal()).unwrap();
            let second = convert(&request, &ReflowConfig::default(), &Capabilities::minimal()).unwrap();
            assert_eq!(first.bytes.len(), second.bytes.len(), "{}", format);
            assert_eq!(first.strategy, second.strategy, "{}", format);
        }
    }

    #[test]
    fn test_html_keeps_page_text_in_this_build() {
        let config = ReflowConfig::default();
        let request = ConversionRequest::new(invoice(), TargetFormat::Html).with_dpi(36);
        let output = convert(&request, &config, &Capabilities::probe(&config)).unwrap();

        if cfg!(feature = "mupdf") {
            assert_eq!(output.strategy, "page-images");
        } else {
            assert_eq!(output.strategy, "positioned-text");
            let html = String::from_utf8(output.bytes).unwrap();
            assert!(html.contains("Pen"));
            assert!(html.contains("9.99"));
        }
    }

    #[test]
    fn test_dpi_override_reaches_every_raster() {
        let request = ConversionRequest::new(invoice(), TargetFormat::Ppt).with_dpi(96);
        let config = request.effective_config(&ReflowConfig::default());
        assert_eq!(config.raster.html_dpi, 96);
        assert_eq!(config.raster.image_dpi, 96);
        assert_eq!(config.slides.fallback_dpi, 96);

        let untouched = ConversionRequest::new(invoice(), TargetFormat::Ppt).effective_config(&ReflowConfig::default());
        assert_eq!(untouched.slides.fallback_dpi, SlideConfig::default().fallback_dpi);
    }

    #[test]
    fn test_psd_request_downgrades() {
        let request = ConversionRequest::new(invoice(), TargetFormat::Image)
            .with_image_format(ImageTarget::Psd)
            .with_page(1)
            .with_dpi(36);
        let output = convert(&request, &ReflowConfig::default(), &Capabilities::minimal()).unwrap();
        assert_eq!(output.effective_format, "png");
        assert_eq!(output.extension, "png");
    }

    #[test]
    fn test_invalid_requests() {
        let config = ReflowConfig::default();
        let capabilities = Capabilities::minimal();

        let empty = ConversionRequest::new(Vec::new(), TargetFormat::Word);
        assert!(matches!(convert(&empty, &config, &capabilities), Err(ReflowError::SourceRead(_))));

        let garbage = ConversionRequest::new(b"not a pdf".to_vec(), TargetFormat::Word);
        assert!(matches!(convert(&garbage, &config, &capabilities), Err(ReflowError::SourceRead(_))));

        let quality = ConversionRequest::new(invoice(), TargetFormat::Image).with_quality(0);
        assert!(matches!(convert(&quality, &config, &capabilities), Err(ReflowError::Config(_))));
    }

    #[test]
    fn test_convert_to_path_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/invoice.docx");
        let request = ConversionRequest::new(invoice(), TargetFormat::Word);

        let output = convert_to_path(&request, &destination, &ReflowConfig::default(), &Capabilities::minimal()).unwrap();
        assert_eq!(std::fs::read(&destination).unwrap().len(), output.bytes.len());
    }
}
