//! Derived spreadsheet pipeline: PDF to document, then document to cells.
//!
//! The document body is walked in order. Paragraphs land in column A, tables
//! keep their grid with a blank row on either side.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use super::structural::{pdf_to_document, StructuralEngine};
use crate::classify::ValueClassifier;
use crate::error::{Result, WriterError};
use crate::models::config::ReflowConfig;
use crate::pdf::PdfProcessor;
use crate::writers::ooxml::read_part;
use crate::writers::xlsx::{new_workbook, write_classified};
use crate::writers::StyleBook;

/// Name of the worksheet written by the derived pipeline.
pub const DERIVED_SHEET_NAME: &str = "PDF Content";

/// A body-level element of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    Paragraph { text: String, bold: bool },
    /// Cell texts row by row. Paragraphs inside a cell are joined by newlines.
    Table(Vec<Vec<String>>),
}

fn is_on(element: &BytesStart<'_>) -> bool {
    match element.try_get_attribute("w:val") {
        Ok(Some(attr)) => !matches!(attr.value.as_ref(), b"0" | b"false" | b"off"),
        _ => true,
    }
}

#[derive(Default)]
struct BodyWalker {
    elements: Vec<BodyElement>,
    table_depth: usize,
    rows: Vec<Vec<String>>,
    cell: Option<Vec<String>>,
    paragraph: Option<(String, bool)>,
    in_run: bool,
    in_run_properties: bool,
    in_text: bool,
}

impl BodyWalker {
    fn push_text(&mut self, text: &str) {
        if self.table_depth == 0 {
            if let Some((buffer, _)) = self.paragraph.as_mut() {
                buffer.push_str(text);
            }
        } else if let Some(last) = self.cell.as_mut().and_then(|c| c.last_mut()) {
            last.push_str(text);
        }
    }

    fn start(&mut self, element: &BytesStart<'_>, empty: bool) {
        match element.name().as_ref() {
            b"w:tbl" if !empty => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"w:tr" if self.table_depth == 1 => self.rows.push(Vec::new()),
            b"w:tc" if self.table_depth == 1 => {
                self.cell = Some(Vec::new());
                if empty {
                    self.end(b"w:tc");
                }
            }
            b"w:p" => {
                if self.table_depth == 0 {
                    if !empty {
                        self.paragraph = Some((String::new(), false));
                    }
                } else if let Some(cell) = self.cell.as_mut() {
                    cell.push(String::new());
                }
            }
            b"w:r" if !empty => self.in_run = true,
            b"w:rPr" if !empty => self.in_run_properties = true,
            b"w:t" if !empty => self.in_text = true,
            b"w:b" if self.in_run && self.in_run_properties && is_on(element) => {
                if self.table_depth == 0 {
                    if let Some((_, bold)) = self.paragraph.as_mut() {
                        *bold = true;
                    }
                }
            }
            b"w:tab" => self.push_text("\t"),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_properties = false,
            b"w:r" => self.in_run = false,
            b"w:p" if self.table_depth == 0 => {
                if let Some((text, bold)) = self.paragraph.take() {
                    self.elements.push(BodyElement::Paragraph { text, bold });
                }
            }
            b"w:tc" if self.table_depth == 1 => {
                if let Some(paragraphs) = self.cell.take() {
                    let text = paragraphs.join("\n");
                    if let Some(row) = self.rows.last_mut() {
                        row.push(text);
                    }
                }
            }
            b"w:tbl" if self.table_depth > 0 => {
                self.table_depth -= 1;
                if self.table_depth == 0 {
                    self.elements.push(BodyElement::Table(std::mem::take(&mut self.rows)));
                }
            }
            _ => {}
        }
    }
}

/// Body paragraphs and tables of a `word/document.xml` part, in document order.
pub fn read_body(xml: &str) -> std::result::Result<Vec<BodyElement>, WriterError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => walker.start(&e, false),
            Event::Empty(e) => walker.start(&e, true),
            Event::End(e) => walker.end(e.name().as_ref()),
            Event::Text(t) if walker.in_text => {
                let text = t.unescape()?;
                walker.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(walker.elements)
}

/// Convert a packaged document into a one-sheet workbook.
pub fn document_to_spreadsheet(
    docx: &[u8],
    config: &ReflowConfig,
    classifier: &dyn ValueClassifier,
) -> Result<Vec<u8>> {
    let xml = read_part(docx, "word/document.xml")?;
    let body = read_body(&xml)?;
    let styles = StyleBook::new(&config.spreadsheet.number_format);

    let mut workbook = new_workbook().map_err(WriterError::from)?;
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DERIVED_SHEET_NAME).map_err(WriterError::from)?;

    // Longest text per 0-based column, for auto-fit.
    let mut widths: BTreeMap<u16, usize> = BTreeMap::new();
    let mut note_width = |column: u16, text: &str| {
        let len = text.chars().count();
        let entry = widths.entry(column).or_insert(0);
        *entry = (*entry).max(len);
    };

    let mut excel_row: u32 = 0;
    let mut tables = 0usize;
    for element in &body {
        match element {
            BodyElement::Paragraph { text, bold } => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if *bold {
                    worksheet
                        .write_string_with_format(excel_row, 0, text, &styles.bold)
                        .map_err(WriterError::from)?;
                } else {
                    worksheet.write_string(excel_row, 0, text).map_err(WriterError::from)?;
                }
                note_width(0, text);
                excel_row += 1;
            }
            BodyElement::Table(rows) if !rows.is_empty() => {
                tables += 1;
                let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
                debug!("Writing table {}: {} rows, {} columns", tables, rows.len(), columns);
                if excel_row > 0 {
                    excel_row += 1;
                }
                for (row_index, row) in rows.iter().enumerate() {
                    for column in 0..columns {
                        let text = row.get(column).map(|c| c.trim()).unwrap_or("");
                        let (numeric, plain) = if row_index == 0 {
                            (&styles.table_header, &styles.table_header)
                        } else {
                            (&styles.table_numeric, &styles.table_text)
                        };
                        let column = column as u16;
                        write_classified(worksheet, excel_row, column, text, classifier, numeric, plain)
                            .map_err(WriterError::from)?;
                        note_width(column, text);
                    }
                    excel_row += 1;
                }
                excel_row += 1;
            }
            BodyElement::Table(_) => {}
        }
    }

    for (column, longest) in widths {
        let width = ((longest + 2) as f64).min(config.spreadsheet.derived_max_column_width);
        worksheet.set_column_width(column, width).map_err(WriterError::from)?;
    }

    info!("Derived sheet: {} rows, {} tables", excel_row, tables);
    Ok(workbook.save_to_buffer().map_err(WriterError::from)?)
}

/// PDF to document through the structural engine, then to a workbook.
pub fn pdf_to_spreadsheet_derived(
    pdf: &dyn PdfProcessor,
    config: &ReflowConfig,
    engine: &dyn StructuralEngine,
    classifier: &dyn ValueClassifier,
) -> Result<Vec<u8>> {
    let docx = pdf_to_document(pdf, config, engine)?;
    debug!("Intermediate document: {} bytes", docx.len());
    document_to_spreadsheet(&docx, config, classifier)
}
