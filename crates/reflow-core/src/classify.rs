//! Cell value classification for spreadsheet output.

use serde::Serialize;

/// A cell's text together with its numeric reading, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedCellValue {
    pub raw_text: String,
    pub numeric_value: Option<f64>,
    pub is_numeric: bool,
}

impl ClassifiedCellValue {
    /// A value that is always written as text.
    pub fn text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            numeric_value: None,
            is_numeric: false,
        }
    }

    fn number(raw_text: impl Into<String>, value: f64) -> Self {
        Self {
            raw_text: raw_text.into(),
            numeric_value: Some(value),
            is_numeric: true,
        }
    }
}

/// Decides how a cell's raw text is written.
pub trait ValueClassifier: Send + Sync {
    fn classify(&self, raw_text: &str) -> ClassifiedCellValue;
}

/// Numbers with `,` thousands separators and stray spaces.
///
/// Currency symbols, parenthesized negatives and other separators stay text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericClassifier;

impl NumericClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ValueClassifier for NumericClassifier {
    fn classify(&self, raw_text: &str) -> ClassifiedCellValue {
        let stripped: String = raw_text.chars().filter(|c| *c != ',' && *c != ' ').collect();

        if stripped.chars().any(char::is_alphabetic) {
            return ClassifiedCellValue::text(raw_text);
        }

        match stripped.parse::<f64>() {
            Ok(value) if value.is_finite() => ClassifiedCellValue::number(raw_text, value),
            _ => ClassifiedCellValue::text(raw_text),
        }
    }
}

/// Classify with the default numeric rule.
pub fn classify(raw_text: &str) -> ClassifiedCellValue {
    NumericClassifier.classify(raw_text)
}
