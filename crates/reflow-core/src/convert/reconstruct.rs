//! Coordinate reconstruction: documents and spreadsheets rebuilt from
//! positioned page content, without structural table metadata.

use rust_xlsxwriter::{Image, Workbook, Worksheet};
use tracing::{debug, info};

use crate::classify::ValueClassifier;
use crate::error::{Result, WriterError};
use crate::extract::extract_page_content;
use crate::geometry::{compute_page_geometry, POINTS_PER_INCH};
use crate::grid::{build_sheet_model, CellRole, SheetImage, SheetModel};
use crate::heuristics::HeaderHeuristic;
use crate::models::config::{GridConfig, ReflowConfig};
use crate::models::PositionedContentItem;
use crate::pdf::PdfProcessor;
use crate::writers::xlsx::{new_workbook, sheet_name, write_classified};
use crate::writers::{DocxBuilder, RunStyle, StyleBook};

/// Name of the single worksheet written by the direct pipeline.
pub const DIRECT_SHEET_NAME: &str = "PDF to Excel";

/// Every page's content items, in page order.
pub fn extract_all_pages(pdf: &dyn PdfProcessor) -> Result<Vec<Vec<PositionedContentItem>>> {
    (0..pdf.page_count())
        .map(|index| Ok(extract_page_content(pdf, index)?))
        .collect()
}

/// Rebuild an editable document line by line.
///
/// One paragraph per text line with its font carried over, one inline picture
/// per image. A page break precedes a page only when that page has content.
pub fn pdf_to_document_fallback(pdf: &dyn PdfProcessor, config: &ReflowConfig) -> Result<Vec<u8>> {
    let geometry = compute_page_geometry(pdf, &config.geometry);
    let mut builder = DocxBuilder::new(&geometry).with_paragraph_spacing(config.document.paragraph_spacing_pt);

    for index in 0..pdf.page_count() {
        let items = extract_page_content(pdf, index)?;
        if items.is_empty() {
            continue;
        }
        if builder.block_count() > 0 {
            builder = builder.page_break();
        }

        for item in &items {
            builder = match item {
                PositionedContentItem::Text(run) => builder.paragraph(
                    &run.text,
                    &RunStyle {
                        size_pt: Some(run.font_size),
                        font_name: Some(run.font_name.clone()),
                        bold: run.bold,
                        italic: run.italic,
                    },
                ),
                PositionedContentItem::Image(image) => {
                    let width = (image.bbox.width() / POINTS_PER_INCH).clamp(
                        config.document.min_image_width_in,
                        config.document.max_image_width_in,
                    );
                    let height = if image.bbox.width() > 0.0 {
                        width * image.bbox.height() / image.bbox.width()
                    } else {
                        width
                    };
                    builder.picture(&image.raw_bytes, width, height)
                }
            };
        }
    }

    info!("Reconstructed document with {} blocks", builder.block_count());
    Ok(builder.finish()?)
}

/// Write a placed sheet model into a new worksheet of `workbook`.
pub fn write_sheet_model(
    workbook: &mut Workbook,
    sheet: &SheetModel,
    styles: &StyleBook,
    classifier: &dyn ValueClassifier,
    grid: &GridConfig,
) -> std::result::Result<(), WriterError> {
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&sheet.name))?;

    let mut numeric_cells = 0usize;
    for (address, cell) in sheet.cells() {
        let (row, column) = address.zero_based();
        match cell.role {
            CellRole::Data => {
                if write_classified(worksheet, row, column, &cell.text, classifier, &styles.numeric, &styles.text)? {
                    numeric_cells += 1;
                }
            }
            CellRole::Header => {
                worksheet.write_string_with_format(row, column, &cell.text, &styles.header)?;
            }
            CellRole::PageSeparator => {
                worksheet.write_string_with_format(row, column, &cell.text, &styles.separator)?;
            }
        }
    }

    for image in &sheet.images {
        insert_scaled_image(worksheet, image)?;
    }

    for column in 0..sheet.max_column().max(1) {
        worksheet.set_column_width(column, grid.column_width)?;
    }

    debug!(
        "Sheet '{}': {} cells ({} numeric), {} images",
        sheet.name,
        sheet.cell_count(),
        numeric_cells,
        sheet.images.len()
    );
    Ok(())
}

fn insert_scaled_image(worksheet: &mut Worksheet, image: &SheetImage) -> std::result::Result<(), WriterError> {
    let (row, column) = image.address.zero_based();
    let scale_x = image.display_width_px as f64 / image.source_width_px.max(1) as f64;
    let scale_y = image.display_height_px as f64 / image.source_height_px.max(1) as f64;
    let picture = Image::new_from_buffer(&image.png)?
        .set_scale_width(scale_x)
        .set_scale_height(scale_y);
    worksheet.insert_image(row, column, &picture)?;
    Ok(())
}

/// Direct spreadsheet pipeline: every page on one grid-mapped sheet.
pub fn pdf_to_spreadsheet(
    pdf: &dyn PdfProcessor,
    config: &ReflowConfig,
    classifier: &dyn ValueClassifier,
    heuristic: &dyn HeaderHeuristic,
) -> Result<Vec<u8>> {
    let pages = extract_all_pages(pdf)?;
    let sheet = build_sheet_model(DIRECT_SHEET_NAME, &pages, &config.grid, heuristic);
    info!(
        "Mapped {} pages onto {} rows with the '{}' header heuristic",
        pages.len(),
        sheet.max_row(),
        heuristic.name()
    );

    let styles = StyleBook::new(&config.spreadsheet.number_format);
    let mut workbook = new_workbook().map_err(WriterError::from)?;
    write_sheet_model(&mut workbook, &sheet, &styles, classifier, &config.grid)?;
    Ok(workbook.save_to_buffer().map_err(WriterError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::NumericClassifier;
    use crate::heuristics::{BankStatementHeader, FirstRowHeader};
    use crate::pdf::testing::{PdfBuilder, TestImage};
    use crate::pdf::LopdfProcessor;
    use crate::writers::ooxml::read_part;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    fn load(data: Vec<u8>) -> LopdfProcessor {
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();
        pdf
    }

    fn read_sheet(bytes: Vec<u8>, name: &str) -> calamine::Range<Data> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        workbook.worksheet_range(name).unwrap()
    }

    fn invoice_pdf() -> LopdfProcessor {
        load(
            PdfBuilder::new(612.0, 792.0)
                .table(
                    10.0,
                    700.0,
                    72.0,
                    20.0,
                    11.0,
                    &[&["Item", "Qty", "Price"], &["Pen", "3", "1.50"], &["Book", "1", "9.99"]],
                )
                .build(),
        )
    }

    #[test]
    fn test_invoice_table_types() {
        let pdf = invoice_pdf();
        let bytes = pdf_to_spreadsheet(&pdf, &ReflowConfig::default(), &NumericClassifier, &FirstRowHeader).unwrap();
        let range = read_sheet(bytes, DIRECT_SHEET_NAME);

        let rows: Vec<_> = range.rows().filter(|r| r.iter().any(|c| *c != Data::Empty)).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Data::String("Item".into()));
        assert_eq!(rows[0][1], Data::String("Qty".into()));
        assert_eq!(rows[1][0], Data::String("Pen".into()));
        assert_eq!(rows[1][1], Data::Float(3.0));
        assert_eq!(rows[2][2], Data::Float(9.99));

        let price_total: f64 = rows[1..]
            .iter()
            .filter_map(|r| match r[2] {
                Data::Float(v) => Some(v),
                _ => None,
            })
            .sum();
        assert!((price_total - 11.49).abs() < 1e-9);
    }

    #[test]
    fn test_page_separator_and_bank_header() {
        let pdf = load(
            PdfBuilder::new(612.0, 792.0)
                .text(10.0, 50.0, 11.0, "Summary")
                .new_page()
                .text(10.0, 50.0, 11.0, "Transaction list")
                .text(10.0, 30.0, 11.0, "Coffee")
                .build(),
        );
        let config = ReflowConfig::default();
        let sheet = build_sheet_model(DIRECT_SHEET_NAME, &extract_all_pages(&pdf).unwrap(), &config.grid, &BankStatementHeader);

        let separator = sheet.rows().into_iter().find(|r| sheet.row_role(*r) == Some(CellRole::PageSeparator));
        let separator = separator.unwrap();
        assert_eq!(sheet.row_text(separator), "=== PAGE 2 ===");

        let header = sheet.rows().into_iter().find(|r| sheet.row_role(*r) == Some(CellRole::Header)).unwrap();
        assert!(header > separator);
        assert_eq!(sheet.cell(header, 1).unwrap().text, "Transaction Date");
        assert!(sheet.row_text(header + 1).contains("Transaction list"));

        let bytes = pdf_to_spreadsheet(&pdf, &config, &NumericClassifier, &BankStatementHeader).unwrap();
        let range = read_sheet(bytes, DIRECT_SHEET_NAME);
        assert!(range.rows().any(|r| r[0] == Data::String("=== PAGE 2 ===".into())));
    }

    #[test]
    fn test_images_are_embedded() {
        let pdf = load(
            PdfBuilder::new(612.0, 792.0)
                .text(10.0, 50.0, 11.0, "Logo below")
                .image(10.0, 100.0, 20.0, 10.0, TestImage::rgb(4, 2, [200, 0, 0]))
                .build(),
        );
        let bytes = pdf_to_spreadsheet(&pdf, &ReflowConfig::default(), &NumericClassifier, &FirstRowHeader).unwrap();
        let names = crate::writers::ooxml::part_names(&bytes).unwrap();
        assert!(names.iter().any(|n| n.starts_with("xl/media/")));
    }

    #[test]
    fn test_document_fallback_has_no_tables() {
        let pdf = load(
            PdfBuilder::new(612.0, 792.0)
                .bold_text(72.0, 60.0, 18.0, "Heading")
                .table(72.0, 100.0, 100.0, 20.0, 11.0, &[&["a", "b"], &["c", "d"]])
                .new_page()
                .new_page()
                .text(72.0, 60.0, 11.0, "Last page")
                .build(),
        );
        let bytes = pdf_to_document_fallback(&pdf, &ReflowConfig::default()).unwrap();
        let xml = read_part(&bytes, "word/document.xml").unwrap();

        assert!(xml.contains("Heading"));
        assert!(xml.contains("Last page"));
        assert!(!xml.contains("<w:tbl"));
        assert_eq!(xml.matches("w:type=\"page\"").count(), 1);
        assert!(xml.contains("w:before=\"60\""));
    }

    /// `s` attribute of the cell at `reference` in a worksheet part.
    fn cell_style_index(sheet_xml: &str, reference: &str) -> usize {
        let tag = format!("<c r=\"{}\"", reference);
        let start = sheet_xml.find(&tag).unwrap() + tag.len();
        let attributes = &sheet_xml[start..start + sheet_xml[start..].find('>').unwrap()];
        attributes
            .split(" s=\"")
            .nth(1)
            .map(|rest| rest[..rest.find('"').unwrap()].parse().unwrap())
            .unwrap_or(0)
    }

    /// `<xf>` records of the cellXfs table, in index order.
    fn cell_formats(styles_xml: &str) -> Vec<String> {
        let start = styles_xml.find("<cellXfs").unwrap();
        let end = start + styles_xml[start..].find("</cellXfs>").unwrap();
        styles_xml[start..end].split("<xf ").skip(1).map(str::to_string).collect()
    }

    fn a1(range: &calamine::Range<Data>, value: &Data) -> String {
        let (row0, col0) = range.start().unwrap();
        let (row, col, _) = range.cells().find(|(_, _, cell)| *cell == value).unwrap();
        let column = (b'A' + (col0 as usize + col) as u8) as char;
        format!("{}{}", column, row0 as usize + row + 1)
    }

    #[test]
    fn test_invoice_cell_alignment_and_number_format() {
        let pdf = invoice_pdf();
        let bytes = pdf_to_spreadsheet(&pdf, &ReflowConfig::default(), &NumericClassifier, &FirstRowHeader).unwrap();
        let range = read_sheet(bytes.clone(), DIRECT_SHEET_NAME);
        let sheet_xml = read_part(&bytes, "xl/worksheets/sheet1.xml").unwrap();
        let formats = cell_formats(&read_part(&bytes, "xl/styles.xml").unwrap());

        for value in [Data::Float(3.0), Data::Float(9.99), Data::Float(1.5)] {
            let xf = &formats[cell_style_index(&sheet_xml, &a1(&range, &value))];
            assert!(xf.contains("horizontal=\"right\""), "{:?}: {}", value, xf);
            // 0.00 is built-in number format 2
            assert!(xf.contains("numFmtId=\"2\""), "{:?}: {}", value, xf);
        }
        for value in [Data::String("Pen".into()), Data::String("Book".into())] {
            let xf = &formats[cell_style_index(&sheet_xml, &a1(&range, &value))];
            assert!(xf.contains("horizontal=\"left\""), "{:?}: {}", value, xf);
            assert!(xf.contains("numFmtId=\"0\""), "{:?}: {}", value, xf);
        }
    }
}
