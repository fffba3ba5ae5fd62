//! Simple spreadsheet pipeline: a sheet per detected table and a text sheet per page.

use tracing::{debug, info};

use super::layout::detect_tables;
use super::text::layout_lines;
use crate::classify::ValueClassifier;
use crate::error::{ReflowError, Result, WriterError};
use crate::extract::extract_page_content;
use crate::models::config::ReflowConfig;
use crate::models::PositionedContentItem;
use crate::pdf::PdfProcessor;
use crate::writers::xlsx::{new_workbook, sheet_name, write_classified};
use crate::writers::StyleBook;

pub fn pdf_to_spreadsheet_simple(
    pdf: &dyn PdfProcessor,
    config: &ReflowConfig,
    classifier: &dyn ValueClassifier,
) -> Result<Vec<u8>> {
    let styles = StyleBook::new(&config.spreadsheet.number_format);
    let mut workbook = new_workbook().map_err(WriterError::from)?;
    let mut sheets = 0usize;
    let mut tables = 0usize;

    for index in 0..pdf.page_count() {
        let page_number = index + 1;
        let items = extract_page_content(pdf, index)?;

        for (k, table) in detect_tables(&items, &config.layout).iter().enumerate() {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(sheet_name(&format!("P{}_T{}", page_number, k + 1)))
                .map_err(WriterError::from)?;
            for (r, row) in table.rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    write_classified(worksheet, r as u32, c as u16, &cell.text, classifier, &styles.numeric, &styles.text)
                        .map_err(WriterError::from)?;
                }
            }
            debug!("Page {} table {}: {} rows", page_number, k + 1, table.rows.len());
            tables += 1;
            sheets += 1;
        }

        let runs: Vec<_> = items
            .iter()
            .filter_map(PositionedContentItem::as_text)
            .cloned()
            .collect();
        let lines = layout_lines(&runs, config.layout.row_tolerance_pt);
        if lines.iter().all(|l| l.trim().is_empty()) {
            continue;
        }

        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(format!("P{}_Text", page_number))
            .map_err(WriterError::from)?;
        for (r, line) in lines.iter().enumerate() {
            worksheet
                .write_string_with_format(r as u32, 0, line, &styles.wrapped)
                .map_err(WriterError::from)?;
        }
        worksheet
            .set_column_width(0, config.grid.text_column_width)
            .map_err(WriterError::from)?;
        sheets += 1;
    }

    if sheets == 0 {
        return Err(ReflowError::strategy("simple", "no tables or text found"));
    }
    info!("Simple workbook: {} sheets, {} tables", sheets, tables);
    Ok(workbook.save_to_buffer().map_err(WriterError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::NumericClassifier;
    use crate::pdf::testing::PdfBuilder;
    use crate::pdf::LopdfProcessor;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_sheet_per_table_and_page_text() {
        let data = PdfBuilder::new(612.0, 792.0)
            .text(72.0, 740.0, 14.0, "Prices")
            .table(72.0, 700.0, 100.0, 20.0, 11.0, &[&["Item", "Qty"], &["Pen", "3"]])
            .new_page()
            .text(72.0, 700.0, 11.0, "Notes only")
            .build();
        let mut pdf = LopdfProcessor::new();
        pdf.load(&data).unwrap();

        let bytes = pdf_to_spreadsheet_simple(&pdf, &ReflowConfig::default(), &NumericClassifier).unwrap();
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["P1_T1", "P1_Text", "P2_Text"]);

        let table = workbook.worksheet_range("P1_T1").unwrap();
        assert_eq!(table.get_value((1, 1)), Some(&Data::Float(3.0)));

        let text = workbook.worksheet_range("P2_Text").unwrap();
        assert_eq!(text.get_value((0, 0)), Some(&Data::String("Notes only".into())));
    }
}
