//! Plain text output.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::error::{ReflowError, Result};
use crate::extract::page_text_runs;
use crate::models::config::LayoutConfig;
use crate::models::TextRun;
use crate::pdf::PdfProcessor;

const RULE_WIDTH: usize = 80;

/// Join runs sharing a row into visual lines, top to bottom.
pub fn layout_lines(runs: &[TextRun], row_tolerance_pt: f32) -> Vec<String> {
    let mut sorted: Vec<&TextRun> = runs.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<(f32, Vec<&TextRun>)> = Vec::new();
    for run in sorted {
        match lines.last_mut() {
            Some((top, row)) if (run.bbox.y0 - *top).abs() <= row_tolerance_pt => row.push(run),
            _ => lines.push((run.bbox.y0, vec![run])),
        }
    }

    lines
        .into_iter()
        .map(|(_, mut row)| {
            row.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
            row.iter().map(|r| r.text.trim()).collect::<Vec<_>>().join(" ")
        })
        .collect()
}

/// Text of every page in layout order, framed by page separators.
pub fn pdf_to_text_layout(pdf: &dyn PdfProcessor, layout: &LayoutConfig) -> Result<Vec<u8>> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut parts: Vec<String> = Vec::new();

    for index in 0..pdf.page_count() {
        let runs = page_text_runs(pdf, index)?;
        let text = layout_lines(&runs, layout.row_tolerance_pt).join("\n");
        if text.trim().is_empty() {
            debug!("Page {} has no text", index + 1);
            continue;
        }
        parts.push(format!("\n{}", rule));
        parts.push(format!("PAGE {}", index + 1));
        parts.push(format!("{}\n", rule));
        parts.push(text);
    }

    if parts.is_empty() {
        return Err(ReflowError::strategy("layout-text", "no text on any page"));
    }
    info!("Extracted layout text from {} pages", parts.len() / 4);
    Ok(parts.join("\n").into_bytes())
}

/// Whole-document text from the plain extractor.
pub fn pdf_to_text_plain(pdf: &dyn PdfProcessor) -> Result<Vec<u8>> {
    let text = pdf
        .extract_text()
        .map_err(|e| ReflowError::strategy("plain-text", e))?;
    if text.trim().is_empty() {
        return Err(ReflowError::strategy("plain-text", "extractor returned no text"));
    }
    Ok(text.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::PdfBuilder;
    use crate::pdf::LopdfProcessor;

    fn load(data: Vec<u8>) -> LopdfProcessor {
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();
        pdf
    }

    #[test]
    fn test_separators_and_order() {
        let pdf = load(
            PdfBuilder::new(612.0, 792.0)
                .text(300.0, 700.0, 12.0, "right")
                .text(72.0, 700.0, 12.0, "left")
                .text(72.0, 650.0, 12.0, "below")
                .new_page()
                .text(72.0, 700.0, 12.0, "next")
                .build(),
        );
        let text = String::from_utf8(pdf_to_text_layout(&pdf, &LayoutConfig::default()).unwrap()).unwrap();

        assert!(text.contains(&format!("{}\nPAGE 1\n{}", "=".repeat(80), "=".repeat(80))));
        assert!(text.contains("left right\nbelow"));
        assert!(text.find("PAGE 2").unwrap() < text.find("next").unwrap());
    }

    #[test]
    fn test_blank_document_fails() {
        let pdf = load(PdfBuilder::new(612.0, 792.0).build());
        let err = pdf_to_text_layout(&pdf, &LayoutConfig::default()).unwrap_err();
        assert!(err.is_recoverable());
    }
}
