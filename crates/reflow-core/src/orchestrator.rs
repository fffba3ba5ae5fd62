//! Per-format fallback chains.
//!
//! Every target format is an ordered list of named strategies. A single driver
//! loop, [`run_chain`], tries them in order, records a [`ConversionAttempt`]
//! for each and stops at the first one that produces output. Recoverable
//! errors move on to the next strategy; anything else aborts the chain.

use serde::Serialize;
use tracing::{info, warn};

use crate::capabilities::Capabilities;
use crate::classify::{NumericClassifier, ValueClassifier};
use crate::convert::derived::pdf_to_spreadsheet_derived;
use crate::convert::html::{pdf_to_html_positioned, pdf_to_html_raster};
use crate::convert::image::{pdf_to_images, ImageExport, ImageSettings};
use crate::convert::reconstruct::{pdf_to_document_fallback, pdf_to_spreadsheet};
use crate::convert::simple::pdf_to_spreadsheet_simple;
use crate::convert::slides::{pdf_to_slides, pdf_to_slides_raster};
use crate::convert::structural::{pdf_to_document, LayoutEngine, StructuralEngine};
use crate::convert::text::{pdf_to_text_layout, pdf_to_text_plain};
use crate::error::{ReflowError, Result};
use crate::heuristics::{header_heuristic, HeaderHeuristic};
use crate::models::config::{ReflowConfig, SpreadsheetPipeline};
use crate::pdf::PdfProcessor;

/// Log record for one strategy tried by a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionAttempt {
    pub strategy_name: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ConversionAttempt {
    pub fn succeeded(strategy_name: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(strategy_name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Anything a strategy can produce.
pub trait ChainOutput {
    /// Size of the produced file. Zero fails output verification.
    fn byte_len(&self) -> usize;
}

impl ChainOutput for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ChainOutput for ImageExport {
    fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// A named strategy in a fallback chain.
pub struct Strategy<'a, T> {
    pub name: &'static str,
    run: Box<dyn Fn() -> Result<T> + 'a>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new(name: &'static str, run: impl Fn() -> Result<T> + 'a) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }
}

/// Output of a successful chain.
#[derive(Debug, Clone)]
pub struct ChainResult<T> {
    pub output: T,
    /// Name of the strategy that produced `output`.
    pub strategy: &'static str,
    /// Every attempt in order, the successful one last.
    pub attempts: Vec<ConversionAttempt>,
}

/// Try each strategy until one produces non-empty output.
pub fn run_chain<T: ChainOutput>(format: &str, strategies: Vec<Strategy<'_, T>>) -> Result<ChainResult<T>> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        info!("{}: trying strategy '{}'", format, strategy.name);
        let error = match (strategy.run)() {
            Ok(output) if output.byte_len() > 0 => {
                info!("{}: '{}' produced {} bytes", format, strategy.name, output.byte_len());
                attempts.push(ConversionAttempt::succeeded(strategy.name));
                return Ok(ChainResult {
                    output,
                    strategy: strategy.name,
                    attempts,
                });
            }
            Ok(_) => ReflowError::OutputVerification {
                strategy: strategy.name.to_string(),
                reason: "empty output".to_string(),
            },
            Err(e) => e,
        };

        if !error.is_recoverable() {
            warn!("{}: '{}' failed fatally: {}", format, strategy.name, error);
            return Err(error);
        }
        warn!("{}: '{}' failed: {}", format, strategy.name, error);
        attempts.push(ConversionAttempt::failed(strategy.name, &error));
    }

    Err(ReflowError::TotalConversionFailure {
        format: format.to_string(),
        attempts,
    })
}

/// Spreadsheet pipelines in the order they are tried.
pub fn spreadsheet_pipelines(selected: SpreadsheetPipeline) -> Vec<SpreadsheetPipeline> {
    let mut order = vec![selected];
    for next in [SpreadsheetPipeline::Direct, SpreadsheetPipeline::Simple] {
        if !order.contains(&next) {
            order.push(next);
        }
    }
    order
}

/// Entry point for every format's fallback chain.
pub struct Orchestrator {
    config: ReflowConfig,
    capabilities: Capabilities,
    engine: Box<dyn StructuralEngine>,
    classifier: Box<dyn ValueClassifier>,
    heuristic: Box<dyn HeaderHeuristic>,
}

impl Orchestrator {
    pub fn new(config: ReflowConfig, capabilities: Capabilities) -> Self {
        let mut engine_config = config.clone();
        engine_config.document.structural_enabled &= capabilities.structural_engine;
        let heuristic = header_heuristic(config.spreadsheet.header_heuristic);

        Self {
            engine: Box::new(LayoutEngine::new(&engine_config)),
            classifier: Box::new(NumericClassifier::new()),
            heuristic,
            config,
            capabilities,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn StructuralEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn ValueClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Box<dyn HeaderHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn config(&self) -> &ReflowConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Structural conversion, then coordinate reconstruction.
    pub fn to_word(&self, pdf: &dyn PdfProcessor) -> Result<ChainResult<Vec<u8>>> {
        run_chain(
            "word",
            vec![
                Strategy::new("structural", || pdf_to_document(pdf, &self.config, self.engine.as_ref())),
                Strategy::new("reconstruct", || pdf_to_document_fallback(pdf, &self.config)),
            ],
        )
    }

    /// The configured pipeline, then `direct`, then `simple`.
    pub fn to_excel(&self, pdf: &dyn PdfProcessor) -> Result<ChainResult<Vec<u8>>> {
        let strategies = spreadsheet_pipelines(self.config.spreadsheet.pipeline)
            .into_iter()
            .map(move |pipeline| match pipeline {
                SpreadsheetPipeline::Direct => Strategy::new(pipeline.name(), move || {
                    pdf_to_spreadsheet(pdf, &self.config, self.classifier.as_ref(), self.heuristic.as_ref())
                }),
                SpreadsheetPipeline::Derived => Strategy::new(pipeline.name(), move || {
                    pdf_to_spreadsheet_derived(pdf, &self.config, self.engine.as_ref(), self.classifier.as_ref())
                }),
                SpreadsheetPipeline::Simple => Strategy::new(pipeline.name(), move || {
                    pdf_to_spreadsheet_simple(pdf, &self.config, self.classifier.as_ref())
                }),
            })
            .collect();
        run_chain("excel", strategies)
    }

    /// Paginated text and image slides, then one picture per page.
    pub fn to_ppt(&self, pdf: &dyn PdfProcessor) -> Result<ChainResult<Vec<u8>>> {
        run_chain(
            "ppt",
            vec![
                Strategy::new("slides", || pdf_to_slides(pdf, &self.config.slides)),
                Strategy::new("page-images", || pdf_to_slides_raster(pdf, &self.config.slides)),
            ],
        )
    }

    /// Embedded page images, then positioned text.
    ///
    /// Without a full renderer the page images carry no glyphs, so positioned
    /// text goes first and page images only cover text-less documents.
    pub fn to_html(&self, pdf: &dyn PdfProcessor) -> Result<ChainResult<Vec<u8>>> {
        let raster = Strategy::new("page-images", || pdf_to_html_raster(pdf, self.config.raster.html_dpi));
        let positioned = Strategy::new("positioned-text", || pdf_to_html_positioned(pdf));
        let strategies = if self.capabilities.full_renderer {
            vec![raster, positioned]
        } else {
            vec![positioned, raster]
        };
        run_chain("html", strategies)
    }

    /// Layout-ordered text with page separators, then plain extraction.
    pub fn to_text(&self, pdf: &dyn PdfProcessor) -> Result<ChainResult<Vec<u8>>> {
        run_chain(
            "text",
            vec![
                Strategy::new("layout-text", || pdf_to_text_layout(pdf, &self.config.layout)),
                Strategy::new("plain-text", || pdf_to_text_plain(pdf)),
            ],
        )
    }

    /// Raster export. Format downgrades happen inside the single strategy.
    pub fn to_images(
        &self,
        pdf: &dyn PdfProcessor,
        stem: &str,
        page: Option<usize>,
        settings: &ImageSettings,
    ) -> Result<ChainResult<ImageExport>> {
        run_chain(
            "image",
            vec![Strategy::new("render", || {
                pdf_to_images(pdf, stem, page, settings, &self.capabilities)
            })],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::pdf::testing::{PdfBuilder, TestImage};
    use crate::pdf::LopdfProcessor;
    use crate::writers::ooxml::read_part;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn table_pdf() -> LopdfProcessor {
        let data = PdfBuilder::new(612.0, 792.0)
            .bold_text(72.0, 740.0, 16.0, "Order summary")
            .table(72.0, 700.0, 100.0, 20.0, 11.0, &[&["Item", "Qty", "Price"], &["Pen", "3", "1.50"], &["Book", "1", "9.99"]])
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();
        pdf
    }

    #[test]
    fn test_chain_stops_at_first_success() {
        let second_ran = Cell::new(false);
        let result = run_chain(
            "test",
            vec![
                Strategy::new("first", || Ok(b"one".to_vec())),
                Strategy::new("second", || {
                    second_ran.set(true);
                    Ok(b"two".to_vec())
                }),
            ],
        )
        .unwrap();

        assert_eq!(result.output, b"one".to_vec());
        assert_eq!(result.strategy, "first");
        assert_eq!(result.attempts, vec![ConversionAttempt::succeeded("first")]);
        assert!(!second_ran.get());
    }

    #[test]
    fn test_chain_falls_through_failures() {
        let result = run_chain(
            "test",
            vec![
                Strategy::new("missing", || Err(ReflowError::missing("engine", "not installed"))),
                Strategy::new("empty", || Ok(Vec::new())),
                Strategy::new("works", || Ok(b"ok".to_vec())),
            ],
        )
        .unwrap();

        assert_eq!(result.strategy, "works");
        let names: Vec<&str> = result.attempts.iter().map(|a| a.strategy_name.as_str()).collect();
        assert_eq!(names, vec!["missing", "empty", "works"]);
        assert!(!result.attempts[1].success);
        assert!(result.attempts[1].error.as_deref().unwrap().contains("empty output"));
    }

    #[test]
    fn test_exhausted_chain_lists_every_attempt() {
        let err = run_chain::<Vec<u8>>(
            "word",
            vec![
                Strategy::new("a", || Err(ReflowError::strategy("a", "boom"))),
                Strategy::new("b", || Err(ReflowError::strategy("b", "bang"))),
            ],
        )
        .unwrap_err();

        match &err {
            ReflowError::TotalConversionFailure { format, attempts } => {
                assert_eq!(format, "word");
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("boom"));
        assert!(message.contains("bang"));
    }

    #[test]
    fn test_unreadable_document_aborts_chain() {
        let fallback_ran = Cell::new(false);
        let err = run_chain(
            "text",
            vec![
                Strategy::new("first", || Err(PdfError::Encrypted.into())),
                Strategy::new("second", || {
                    fallback_ran.set(true);
                    Ok(b"x".to_vec())
                }),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, ReflowError::SourceRead(PdfError::Encrypted)));
        assert!(!fallback_ran.get());
    }

    #[test]
    fn test_spreadsheet_pipeline_order() {
        use SpreadsheetPipeline::*;
        assert_eq!(spreadsheet_pipelines(Direct), vec![Direct, Simple]);
        assert_eq!(spreadsheet_pipelines(Derived), vec![Derived, Direct, Simple]);
        assert_eq!(spreadsheet_pipelines(Simple), vec![Simple, Direct]);
    }

    #[test]
    fn test_word_prefers_structural_tables() {
        let orchestrator = Orchestrator::new(ReflowConfig::default(), Capabilities::minimal().with_structural_engine(true));
        let result = orchestrator.to_word(&table_pdf()).unwrap();
        assert_eq!(result.strategy, "structural");
        assert!(read_part(&result.output, "word/document.xml").unwrap().contains("<w:tbl"));
    }

    #[test]
    fn test_word_falls_back_without_engine() {
        let orchestrator = Orchestrator::new(ReflowConfig::default(), Capabilities::minimal());
        let result = orchestrator.to_word(&table_pdf()).unwrap();

        assert_eq!(result.strategy, "reconstruct");
        assert!(!result.output.is_empty());
        assert!(result.attempts[0].error.as_deref().unwrap().contains("missing dependency"));
        // Only the structural engine emits native tables.
        assert!(!read_part(&result.output, "word/document.xml").unwrap().contains("<w:tbl"));
    }

    #[test]
    fn test_excel_derived_pipeline_falls_back_to_direct() {
        let mut config = ReflowConfig::default();
        config.spreadsheet.pipeline = SpreadsheetPipeline::Derived;
        let orchestrator = Orchestrator::new(config, Capabilities::minimal());

        let result = orchestrator.to_excel(&table_pdf()).unwrap();
        assert_eq!(result.strategy, "direct");
        assert_eq!(result.attempts.len(), 2);
    }

    #[test]
    fn test_text_and_html_chains() {
        let mut config = ReflowConfig::default();
        config.raster.html_dpi = 36;
        let orchestrator = Orchestrator::new(config, Capabilities::minimal());
        let pdf = table_pdf();

        let text = orchestrator.to_text(&pdf).unwrap();
        assert_eq!(text.strategy, "layout-text");
        assert!(String::from_utf8(text.output).unwrap().contains("PAGE 1"));

        let html = orchestrator.to_html(&pdf).unwrap();
        assert_eq!(html.strategy, "positioned-text");
        let html = String::from_utf8(html.output).unwrap();
        assert!(html.contains("Order summary"));
        assert!(html.contains("Book"));
    }

    #[test]
    fn test_html_prefers_page_images_with_full_renderer() {
        let mut config = ReflowConfig::default();
        config.raster.html_dpi = 36;
        let capabilities = Capabilities { full_renderer: true, ..Capabilities::minimal() };
        let orchestrator = Orchestrator::new(config, capabilities);

        let html = orchestrator.to_html(&table_pdf()).unwrap();
        assert_eq!(html.strategy, "page-images");
        assert_eq!(html.attempts.len(), 1);
    }

    #[test]
    fn test_html_of_text_less_page_falls_back_to_page_images() {
        let mut config = ReflowConfig::default();
        config.raster.html_dpi = 36;
        let orchestrator = Orchestrator::new(config, Capabilities::minimal());
        let data = PdfBuilder::new(200.0, 200.0)
            .image(20.0, 20.0, 100.0, 100.0, TestImage::rgb(4, 4, [200, 0, 0]))
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let html = orchestrator.to_html(&pdf).unwrap();
        assert_eq!(html.strategy, "page-images");
        assert_eq!(html.attempts.len(), 2);
        assert!(!html.attempts[0].success);
    }

    #[test]
    fn test_ppt_chain() {
        let orchestrator = Orchestrator::new(ReflowConfig::default(), Capabilities::minimal());
        let result = orchestrator.to_ppt(&table_pdf()).unwrap();
        assert_eq!(result.strategy, "slides");
        assert_eq!(result.attempts.len(), 1);
    }
}
