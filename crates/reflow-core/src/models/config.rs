//! Configuration structures for the conversion pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the reflow pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflowConfig {
    /// Target page geometry.
    pub geometry: GeometryConfig,

    /// Point-to-grid mapping for spreadsheet output.
    pub grid: GridConfig,

    /// Spreadsheet pipeline selection and styling.
    pub spreadsheet: SpreadsheetConfig,

    /// Editable document output.
    pub document: DocumentConfig,

    /// Slide deck pagination and layout.
    pub slides: SlideConfig,

    /// Rasterization for HTML and image output.
    pub raster: RasterConfig,

    /// Line grouping and table detection tolerances.
    pub layout: LayoutConfig,
}

/// Which margin set to apply to the measured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeometryVariant {
    #[default]
    Standard,
    Simple,
}

/// Page geometry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Margin added on each side in the standard variant (inches).
    pub margin_in: f32,

    /// Margin added on each side in the simple variant (inches).
    pub simple_margin_in: f32,

    /// Active margin variant.
    pub variant: GeometryVariant,

    /// Page width used when the source page cannot be measured (inches).
    pub default_width_in: f32,

    /// Page height used when the source page cannot be measured (inches).
    pub default_height_in: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            margin_in: 0.5,
            simple_margin_in: 0.25,
            variant: GeometryVariant::Standard,
            default_width_in: 8.5,
            default_height_in: 11.0,
        }
    }
}

impl GeometryConfig {
    /// Margin for the active variant.
    pub fn active_margin(&self) -> f32 {
        match self.variant {
            GeometryVariant::Standard => self.margin_in,
            GeometryVariant::Simple => self.simple_margin_in,
        }
    }
}

/// Coordinate-to-cell mapping constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Horizontal points per spreadsheet column.
    pub points_per_column: f32,

    /// Vertical points per spreadsheet row.
    pub points_per_row: f32,

    /// Upper bound on the column index.
    pub max_columns: u16,

    /// Fixed column width for coordinate sheets.
    pub column_width: f64,

    /// Width of the single wrapped column in text sheets.
    pub text_column_width: f64,

    /// Embedded image pixels per source point.
    pub image_px_per_point: f32,

    /// Minimum embedded image width in pixels.
    pub min_image_width_px: u32,

    /// Minimum embedded image height in pixels.
    pub min_image_height_px: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            points_per_column: 72.0,
            points_per_row: 20.0,
            max_columns: 15,
            column_width: 18.0,
            text_column_width: 100.0,
            image_px_per_point: 10.0,
            min_image_width_px: 80,
            min_image_height_px: 40,
        }
    }
}

/// Spreadsheet pipelines offered by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpreadsheetPipeline {
    /// Coordinate reconstruction straight from the PDF.
    #[default]
    Direct,
    /// PDF to document, then document tables and paragraphs to cells.
    Derived,
    /// One sheet per detected table plus a text sheet per page.
    Simple,
}

impl SpreadsheetPipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Derived => "derived",
            Self::Simple => "simple",
        }
    }
}

impl std::str::FromStr for SpreadsheetPipeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "derived" | "via-word" | "via_word" => Ok(Self::Derived),
            "simple" => Ok(Self::Simple),
            other => Err(format!("unknown spreadsheet pipeline: {}", other)),
        }
    }
}

/// Header heuristics for coordinate sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderHeuristicKind {
    #[default]
    FirstRow,
    BankStatement,
    None,
}

/// Spreadsheet output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    /// Pipeline tried first.
    pub pipeline: SpreadsheetPipeline,

    /// Header heuristic applied by the direct pipeline.
    pub header_heuristic: HeaderHeuristicKind,

    /// Number format for numeric cells.
    pub number_format: String,

    /// Width cap when auto-fitting derived sheets.
    pub derived_max_column_width: f64,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            pipeline: SpreadsheetPipeline::Direct,
            header_heuristic: HeaderHeuristicKind::FirstRow,
            number_format: "0.00".to_string(),
            derived_max_column_width: 50.0,
        }
    }
}

/// Editable document configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Smallest inline picture width (inches).
    pub min_image_width_in: f32,

    /// Largest inline picture width (inches).
    pub max_image_width_in: f32,

    /// Allow the structural engine to run.
    pub structural_enabled: bool,

    /// Worker threads for the structural engine's parallel mode.
    pub structural_workers: usize,

    /// Space before and after body paragraphs (points).
    pub paragraph_spacing_pt: f32,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            min_image_width_in: 0.5,
            max_image_width_in: 7.0,
            structural_enabled: true,
            structural_workers: 4,
            paragraph_spacing_pt: 3.0,
        }
    }
}

/// Slide pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    /// Words budgeted per slide.
    pub words_per_slide: usize,

    /// Characters counted per budgeted word.
    pub chars_per_word: usize,

    /// Slide width (inches).
    pub slide_width_in: f32,

    /// Slide height (inches).
    pub slide_height_in: f32,

    /// Margin around the text frame (inches).
    pub margin_in: f32,

    /// Resolution of the whole-page image fallback.
    pub fallback_dpi: u32,

    /// Source size thresholds and the presentation sizes they map to, largest first.
    pub size_steps: Vec<(f32, f32)>,

    /// Presentation size for text below every threshold.
    pub base_size_pt: f32,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            words_per_slide: 200,
            chars_per_word: 5,
            slide_width_in: 10.0,
            slide_height_in: 7.5,
            margin_in: 0.5,
            fallback_dpi: 150,
            size_steps: vec![(18.0, 32.0), (14.0, 24.0), (11.0, 18.0)],
            base_size_pt: 16.0,
        }
    }
}

impl SlideConfig {
    /// Character budget for one slide.
    pub fn char_budget(&self) -> usize {
        self.words_per_slide * self.chars_per_word
    }
}

/// Rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// DPI for HTML page images.
    pub html_dpi: u32,

    /// DPI for image export.
    pub image_dpi: u32,

    /// Quality for lossy image formats (1-100).
    pub quality: u8,

    /// Timeout for the external image tool (seconds).
    pub tool_timeout_secs: u64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            html_dpi: 300,
            image_dpi: 300,
            quality: 95,
            tool_timeout_secs: 30,
        }
    }
}

/// Line grouping and table detection tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Baselines closer than this are one row (points).
    pub row_tolerance_pt: f32,

    /// Horizontal gap, in multiples of the font size, that splits a line.
    pub span_gap_factor: f32,

    /// Left edges closer than this share a table column (points).
    pub column_tolerance_pt: f32,

    /// Minimum aligned rows that form a table.
    pub min_table_rows: usize,

    /// Minimum cells per row inside a table.
    pub min_table_columns: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_tolerance_pt: 3.0,
            span_gap_factor: 1.5,
            column_tolerance_pt: 12.0,
            min_table_rows: 2,
            min_table_columns: 2,
        }
    }
}

impl ReflowConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReflowConfig::default();
        assert_eq!(config.grid.max_columns, 15);
        assert_eq!(config.slides.char_budget(), 1000);
        assert_eq!(config.spreadsheet.pipeline, SpreadsheetPipeline::Direct);
        assert_eq!(config.geometry.active_margin(), 0.5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ReflowConfig =
            serde_json::from_str(r#"{"spreadsheet": {"pipeline": "derived"}, "geometry": {"variant": "simple"}}"#)
                .unwrap();
        assert_eq!(config.spreadsheet.pipeline, SpreadsheetPipeline::Derived);
        assert_eq!(config.spreadsheet.number_format, "0.00");
        assert_eq!(config.geometry.active_margin(), 0.25);
        assert_eq!(config.raster.html_dpi, 300);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ReflowConfig::default();
        config.slides.words_per_slide = 120;
        config.save(&path).unwrap();

        let loaded = ReflowConfig::from_file(&path).unwrap();
        assert_eq!(loaded.slides.words_per_slide, 120);
    }

    #[test]
    fn test_pipeline_from_str() {
        assert_eq!("Derived".parse::<SpreadsheetPipeline>(), Ok(SpreadsheetPipeline::Derived));
        assert!("fast".parse::<SpreadsheetPipeline>().is_err());
    }
}
