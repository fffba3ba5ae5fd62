//! Shared spreadsheet formats and cell writing.

use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError,
};

use crate::classify::ValueClassifier;

/// Fill behind generated header rows.
pub const HEADER_FILL: u32 = 0xD9D9D9;
/// Fill behind table headers in document-derived sheets.
pub const TABLE_HEADER_FILL: u32 = 0xD3D3D3;
/// Colour of page separator labels.
pub const SEPARATOR_GREY: u32 = 0x808080;

/// Longest worksheet name a workbook accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// The formats every spreadsheet pipeline draws from.
#[derive(Debug, Clone)]
pub struct StyleBook {
    pub numeric: Format,
    pub text: Format,
    pub header: Format,
    pub separator: Format,
    pub bold: Format,
    pub wrapped: Format,
    pub table_header: Format,
    pub table_numeric: Format,
    pub table_text: Format,
}

impl StyleBook {
    pub fn new(number_format: &str) -> Self {
        let bordered = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::VerticalCenter);

        Self {
            numeric: Format::new().set_align(FormatAlign::Right).set_num_format(number_format),
            text: Format::new().set_align(FormatAlign::Left),
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL)),
            separator: Format::new()
                .set_bold()
                .set_italic()
                .set_font_color(Color::RGB(SEPARATOR_GREY)),
            bold: Format::new().set_bold().set_font_size(11),
            wrapped: Format::new().set_text_wrap().set_align(FormatAlign::Top),
            table_header: bordered
                .clone()
                .set_bold()
                .set_font_size(11)
                .set_background_color(Color::RGB(TABLE_HEADER_FILL)),
            table_numeric: bordered.clone().set_align(FormatAlign::Right),
            table_text: bordered.set_align(FormatAlign::Left).set_text_wrap(),
        }
    }
}

/// An empty workbook with a fixed creation date, so one input always yields the same package.
pub fn new_workbook() -> Result<Workbook, XlsxError> {
    let created = ExcelDateTime::from_ymd(1980, 1, 1)?;
    let mut workbook = Workbook::new();
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    Ok(workbook)
}

/// Write a cell through the classifier: numbers with `numeric`, everything else with `text`.
///
/// Returns whether the cell was written as a number.
pub fn write_classified(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    raw_text: &str,
    classifier: &dyn ValueClassifier,
    numeric: &Format,
    text: &Format,
) -> Result<bool, XlsxError> {
    let value = classifier.classify(raw_text);
    match value.numeric_value {
        Some(number) if value.is_numeric => {
            worksheet.write_number_with_format(row, column, number, numeric)?;
            Ok(true)
        }
        _ => {
            worksheet.write_string_with_format(row, column, &value.raw_text, text)?;
            Ok(false)
        }
    }
}

/// A worksheet name the workbook accepts.
pub fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}
