//! Structural PDF to document conversion.
//!
//! A [`StructuralEngine`] rebuilds document structure (tables, paragraphs,
//! pictures) and writes a document file. [`pdf_to_document`] drives it: a
//! parallel run first, one single-threaded retry, output verification, then
//! best-effort post-processing.

use std::path::Path;
use std::thread;

use tracing::{debug, info, warn};

use super::layout::{analyze_page, PageBlock};
use super::postprocess::{enhance, Enhancement};
use crate::error::{ReflowError, Result};
use crate::extract::extract_page_content;
use crate::geometry::{compute_page_geometry, PageGeometry, POINTS_PER_INCH};
use crate::models::config::{DocumentConfig, LayoutConfig, ReflowConfig};
use crate::pdf::PdfProcessor;
use crate::writers::{DocxBuilder, RunStyle};

/// How an engine may schedule its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Analyse pages on up to this many worker threads.
    Parallel(usize),
    SingleProcess,
}

/// Converts a whole PDF into a document file.
pub trait StructuralEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the engine can run in this build.
    fn is_available(&self) -> bool {
        true
    }

    /// Write the converted document to `output`.
    fn convert(
        &self,
        pdf: &dyn PdfProcessor,
        geometry: &PageGeometry,
        output: &Path,
        mode: ExecutionMode,
    ) -> Result<()>;
}

/// Built-in engine: detects tables from aligned text and emits native tables.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    layout: LayoutConfig,
    document: DocumentConfig,
}

impl LayoutEngine {
    pub fn new(config: &ReflowConfig) -> Self {
        Self {
            layout: config.layout.clone(),
            document: config.document.clone(),
        }
    }

    fn analyze(&self, pdf: &dyn PdfProcessor, index: usize) -> Result<Vec<PageBlock>> {
        let items = extract_page_content(pdf, index)?;
        Ok(analyze_page(&items, &self.layout))
    }

    fn analyze_sequential(&self, pdf: &dyn PdfProcessor) -> Result<Vec<Vec<PageBlock>>> {
        (0..pdf.page_count()).map(|index| self.analyze(pdf, index)).collect()
    }

    fn analyze_parallel(&self, pdf: &dyn PdfProcessor, workers: usize) -> Result<Vec<Vec<PageBlock>>> {
        let pages = pdf.page_count();
        let workers = workers.clamp(1, pages.max(1));
        debug!("Analysing {} pages on {} workers", pages, workers);

        let results = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    scope.spawn(move || {
                        (worker..pages)
                            .step_by(workers)
                            .map(|index| (index, self.analyze(pdf, index)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join()).collect::<Vec<_>>()
        });

        let mut pages_out: Vec<Option<Vec<PageBlock>>> = vec![None; pages];
        for result in results {
            let analysed = result.map_err(|_| ReflowError::strategy(self.name(), "worker thread panicked"))?;
            for (index, blocks) in analysed {
                pages_out[index] = Some(blocks?);
            }
        }
        pages_out
            .into_iter()
            .enumerate()
            .map(|(index, blocks)| {
                blocks.ok_or_else(|| ReflowError::strategy(self.name(), format!("page {} was not analysed", index + 1)))
            })
            .collect()
    }

    fn build(&self, pages: &[Vec<PageBlock>], geometry: &PageGeometry) -> Result<Vec<u8>> {
        let mut builder = DocxBuilder::new(geometry);
        let mut wrote_page = false;

        for blocks in pages {
            if blocks.is_empty() {
                continue;
            }
            if wrote_page {
                builder = builder.page_break();
            }
            wrote_page = true;

            let mut previous_bottom: Option<(f32, f32)> = None;
            for block in blocks {
                if let Some((bottom, line_height)) = previous_bottom {
                    if block.top() - bottom > line_height {
                        builder = builder.blank();
                    }
                }
                previous_bottom = Some((block.bottom(), (block.bottom() - block.top()).max(1.0)));

                builder = match block {
                    PageBlock::Paragraph(run) => builder.paragraph(
                        run.text.trim(),
                        &RunStyle {
                            size_pt: Some(run.font_size),
                            font_name: Some(run.font_name.clone()),
                            bold: run.bold,
                            italic: run.italic,
                        },
                    ),
                    PageBlock::Table(table) => builder.table(&table.rows),
                    PageBlock::Image(image) => {
                        let width = (image.bbox.width() / POINTS_PER_INCH)
                            .clamp(self.document.min_image_width_in, self.document.max_image_width_in);
                        let aspect = image.bbox.height() / image.bbox.width().max(1.0);
                        builder.picture(&image.raw_bytes, width, width * aspect)
                    }
                };
            }
        }

        Ok(builder.finish()?)
    }
}

impl StructuralEngine for LayoutEngine {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn is_available(&self) -> bool {
        self.document.structural_enabled
    }

    fn convert(
        &self,
        pdf: &dyn PdfProcessor,
        geometry: &PageGeometry,
        output: &Path,
        mode: ExecutionMode,
    ) -> Result<()> {
        let pages = match mode {
            ExecutionMode::Parallel(workers) => self.analyze_parallel(pdf, workers)?,
            ExecutionMode::SingleProcess => self.analyze_sequential(pdf)?,
        };
        let tables: usize = pages
            .iter()
            .flatten()
            .filter(|b| matches!(b, PageBlock::Table(_)))
            .count();
        debug!("Structural analysis found {} tables", tables);

        let bytes = self.build(&pages, geometry)?;
        std::fs::write(output, bytes)?;
        Ok(())
    }
}

/// Convert through the structural engine, retrying once in single-process mode.
///
/// The intermediate file lives in a call-scoped temporary directory that is
/// removed on every exit path.
pub fn pdf_to_document(
    pdf: &dyn PdfProcessor,
    config: &ReflowConfig,
    engine: &dyn StructuralEngine,
) -> Result<Vec<u8>> {
    if !engine.is_available() {
        return Err(ReflowError::missing(engine.name(), "structural engine is disabled"));
    }

    let geometry = compute_page_geometry(pdf, &config.geometry);
    let workdir = tempfile::Builder::new().prefix("reflow-structural-").tempdir()?;
    let output = workdir.path().join("structural.docx");

    let workers = config.document.structural_workers.max(1);
    if let Err(e) = engine.convert(pdf, &geometry, &output, ExecutionMode::Parallel(workers)) {
        warn!("Parallel structural conversion failed: {}, retrying single-process", e);
        engine
            .convert(pdf, &geometry, &output, ExecutionMode::SingleProcess)
            .map_err(|e| ReflowError::strategy(engine.name(), e))?;
    }

    let bytes = std::fs::read(&output).map_err(|e| ReflowError::OutputVerification {
        strategy: engine.name().to_string(),
        reason: format!("no output file: {}", e),
    })?;
    if bytes.is_empty() {
        return Err(ReflowError::OutputVerification {
            strategy: engine.name().to_string(),
            reason: "output file is empty".to_string(),
        });
    }
    info!("Structural conversion produced {} bytes", bytes.len());

    let enhancement = Enhancement::new(geometry, config.document.paragraph_spacing_pt);
    Ok(enhance(bytes, &enhancement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::PdfBuilder;
    use crate::pdf::LopdfProcessor;
    use crate::writers::ooxml::read_part;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table_pdf() -> LopdfProcessor {
        let data = PdfBuilder::new(612.0, 792.0)
            .bold_text(72.0, 740.0, 16.0, "Order summary")
            .table(72.0, 700.0, 100.0, 20.0, 11.0, &[&["Item", "Qty", "Price"], &["Pen", "3", "1.50"], &["Book", "1", "9.99"]])
            .new_page()
            .text(72.0, 700.0, 11.0, "Second page")
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();
        pdf
    }

    #[test]
    fn test_layout_engine_emits_bordered_table() {
        let pdf = table_pdf();
        let config = ReflowConfig::default();
        let bytes = pdf_to_document(&pdf, &config, &LayoutEngine::new(&config)).unwrap();

        let xml = read_part(&bytes, "word/document.xml").unwrap();
        assert!(xml.contains("Order summary"));
        assert!(xml.contains("<w:tbl>") || xml.contains("<w:tbl "));
        assert!(xml.contains("w:insideH"));
        assert!(xml.contains("Second page"));
        assert!(xml.contains("w:type=\"page\""));
        assert!(xml.contains("w:w=\"13680\""));
    }

    #[test]
    fn test_parallel_and_single_agree() {
        let pdf = table_pdf();
        let engine = LayoutEngine::new(&ReflowConfig::default());
        let parallel = engine.analyze_parallel(&pdf, 4).unwrap();
        let single = engine.analyze_sequential(&pdf).unwrap();
        assert_eq!(parallel, single);
    }

    struct FlakyEngine {
        calls: AtomicUsize,
        fail_single: bool,
    }

    impl StructuralEngine for FlakyEngine {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn convert(&self, _: &dyn PdfProcessor, _: &PageGeometry, output: &Path, mode: ExecutionMode) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match mode {
                ExecutionMode::Parallel(_) => Err(ReflowError::strategy("flaky", "worker crashed")),
                ExecutionMode::SingleProcess if self.fail_single => Err(ReflowError::strategy("flaky", "still broken")),
                ExecutionMode::SingleProcess => {
                    std::fs::write(output, b"")?;
                    Ok(())
                }
            }
        }
    }

    #[test]
    fn test_retry_then_verification_failure() {
        let pdf = table_pdf();
        let engine = FlakyEngine { calls: AtomicUsize::new(0), fail_single: false };
        let err = pdf_to_document(&pdf, &ReflowConfig::default(), &engine).unwrap_err();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, ReflowError::OutputVerification { .. }));
    }

    #[test]
    fn test_both_modes_fail() {
        let pdf = table_pdf();
        let engine = FlakyEngine { calls: AtomicUsize::new(0), fail_single: true };
        let err = pdf_to_document(&pdf, &ReflowConfig::default(), &engine).unwrap_err();

        assert!(matches!(err, ReflowError::StrategyFailure { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_disabled_engine_is_missing_dependency() {
        let pdf = table_pdf();
        let mut config = ReflowConfig::default();
        config.document.structural_enabled = false;
        let err = pdf_to_document(&pdf, &config, &LayoutEngine::new(&config)).unwrap_err();
        assert!(matches!(err, ReflowError::MissingDependency { .. }));
    }
}
