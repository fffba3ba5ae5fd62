//! Editable document assembly on top of docx-rs.

use std::io::Cursor;

use docx_rs::{
    BreakType, Docx, LineSpacing, PageMargin, Paragraph, Pic, Run, RunFonts, Table, TableCell,
    TableRow,
};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::ooxml::{read_part, replace_part};
use crate::error::WriterError;
use crate::geometry::{inches_to_emu, PageGeometry};

lazy_static! {
    static ref PARA_ID: Regex = Regex::new(r#"w14:paraId="[0-9A-Fa-f]+""#).unwrap();
}

const DOCUMENT_PART: &str = "word/document.xml";

/// Character formatting carried onto a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunStyle {
    pub size_pt: Option<f32>,
    pub font_name: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl RunStyle {
    pub fn bold() -> Self {
        Self { bold: true, ..Default::default() }
    }
}

/// One table cell: its text and whether it is emphasized.
#[derive(Debug, Clone, PartialEq)]
pub struct CellText {
    pub text: String,
    pub bold: bool,
}

/// Incremental document builder.
pub struct DocxBuilder {
    docx: Docx,
    paragraph_spacing_twips: Option<u32>,
    blocks: usize,
}

impl DocxBuilder {
    /// A document whose single section matches `geometry`.
    pub fn new(geometry: &PageGeometry) -> Self {
        let (top, right, bottom, left) = geometry.margins_twips();
        let docx = Docx::new()
            .page_size(geometry.page_width_twips(), geometry.page_height_twips())
            .page_margin(
                PageMargin::new()
                    .top(top as i32)
                    .right(right as i32)
                    .bottom(bottom as i32)
                    .left(left as i32),
            );
        Self { docx, paragraph_spacing_twips: None, blocks: 0 }
    }

    /// Space before and after every body paragraph.
    pub fn with_paragraph_spacing(mut self, points: f32) -> Self {
        self.paragraph_spacing_twips = Some((points.max(0.0) * 20.0).round() as u32);
        self
    }

    /// Number of paragraphs, tables and pictures added so far.
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    fn push(mut self, paragraph: Paragraph) -> Self {
        let paragraph = match self.paragraph_spacing_twips {
            Some(twips) => paragraph.line_spacing(LineSpacing::new().before(twips).after(twips)),
            None => paragraph,
        };
        self.docx = self.docx.add_paragraph(paragraph);
        self.blocks += 1;
        self
    }

    pub fn paragraph(self, text: &str, style: &RunStyle) -> Self {
        self.push(Paragraph::new().add_run(styled_run(text, style)))
    }

    pub fn blank(self) -> Self {
        self.push(Paragraph::new())
    }

    pub fn page_break(self) -> Self {
        self.push(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)))
    }

    /// An inline picture of the given display size.
    pub fn picture(self, png: &[u8], width_in: f32, height_in: f32) -> Self {
        let pic = Pic::new(png).size(inches_to_emu(width_in), inches_to_emu(height_in));
        self.push(Paragraph::new().add_run(Run::new().add_image(pic)))
    }

    pub fn table(mut self, rows: &[Vec<CellText>]) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows: Vec<TableRow> = rows
            .iter()
            .map(|row| {
                let cells = (0..columns)
                    .map(|i| {
                        let paragraph = match row.get(i) {
                            Some(cell) if !cell.text.is_empty() => {
                                let style = RunStyle { bold: cell.bold, ..Default::default() };
                                Paragraph::new().add_run(styled_run(&cell.text, &style))
                            }
                            _ => Paragraph::new(),
                        };
                        TableCell::new().add_paragraph(paragraph)
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();

        self.docx = self.docx.add_table(Table::new(rows));
        self.blocks += 1;
        self
    }

    /// Package the document.
    pub fn finish(self) -> Result<Vec<u8>, WriterError> {
        let mut cursor = Cursor::new(Vec::new());
        self.docx
            .build()
            .pack(&mut cursor)
            .map_err(|e| WriterError::Document(e.to_string()))?;

        let package = cursor.into_inner();
        let xml = read_part(&package, DOCUMENT_PART)?;
        replace_part(&package, DOCUMENT_PART, renumber_paragraph_ids(&xml).as_bytes())
    }
}

/// docx-rs draws paragraph ids from a per-thread counter; restart them at 1.
fn renumber_paragraph_ids(xml: &str) -> String {
    let mut next = 0u32;
    PARA_ID
        .replace_all(xml, |_: &Captures| {
            next += 1;
            format!("w14:paraId=\"{:08X}\"", next)
        })
        .into_owned()
}

fn styled_run(text: &str, style: &RunStyle) -> Run {
    let mut run = Run::new().add_text(text);
    if let Some(size) = style.size_pt {
        run = run.size((size * 2.0).round().max(2.0) as usize);
    }
    if let Some(name) = style.font_name.as_deref().filter(|n| !n.is_empty()) {
        run = run.fonts(RunFonts::new().ascii(name).hi_ansi(name));
    }
    if style.bold {
        run = run.bold();
    }
    if style.italic {
        run = run.italic();
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::GeometryConfig;

    #[test]
    fn test_document_xml_contents() {
        let geometry = PageGeometry::fallback(&GeometryConfig::default());
        let builder = DocxBuilder::new(&geometry)
            .paragraph(
                "Quarterly report",
                &RunStyle { size_pt: Some(18.0), font_name: Some("Georgia".into()), bold: true, italic: false },
            )
            .table(&[
                vec![CellText { text: "Item".into(), bold: true }, CellText { text: "Qty".into(), bold: true }],
                vec![CellText { text: "Pen".into(), bold: false }],
            ])
            .page_break();
        assert_eq!(builder.block_count(), 3);

        let bytes = builder.finish().unwrap();
        let xml = read_part(&bytes, "word/document.xml").unwrap();
        assert!(xml.contains("Quarterly report"));
        assert!(xml.contains("w:val=\"36\""));
        assert!(xml.contains("Georgia"));
        assert!(xml.contains("<w:tbl"));
        assert!(xml.contains("w:w=\"12240\""));
        assert!(xml.contains("w:type=\"page\""));
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let geometry = PageGeometry::fallback(&GeometryConfig::default());
        let build = || {
            DocxBuilder::new(&geometry)
                .paragraph("First", &RunStyle::default())
                .paragraph("Second", &RunStyle::bold())
                .finish()
                .unwrap()
        };
        let first = read_part(&build(), DOCUMENT_PART).unwrap();
        let second = read_part(&build(), DOCUMENT_PART).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("w14:paraId=\"00000001\""));
    }

    #[test]
    fn test_paragraph_spacing_applies_to_body() {
        let geometry = PageGeometry::fallback(&GeometryConfig::default());
        let bytes = DocxBuilder::new(&geometry)
            .with_paragraph_spacing(3.0)
            .paragraph("Spaced", &RunStyle::default())
            .finish()
            .unwrap();
        let xml = read_part(&bytes, DOCUMENT_PART).unwrap();
        assert!(xml.contains("w:before=\"60\""));
        assert!(xml.contains("w:after=\"60\""));
    }
}
