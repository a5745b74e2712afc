//! Declarative layout configuration
//!
//! A `LayoutConfig` describes every element drawn onto the template: fixed
//! text fields, images, fixed-size tables, the single page-break-aware table
//! and the page-number stamp. It is loaded once (JSON or TOML) and never
//! mutated during a render.

use crate::error::LayoutError;
use crate::pdf::StandardFont;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Field key used when the page-number stamp is drawn through the text renderer
pub const PAGE_NUMBER_FIELD: &str = "page_number";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    /// Where the template PDF comes from
    pub template: AssetSource,
    #[serde(default)]
    pub font: FontSource,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub text: Vec<FieldPlacement>,
    #[serde(default)]
    pub images: Vec<ImagePlacement>,
    /// Fixed tables; every row must fit on the page they are drawn on
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    /// The one table whose rows may span multiple pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_break_table: Option<PageBreakTableConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<PageNumberConfig>,
}

/// A file supplied by the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    /// First file of an attachment field on another host record
    Attachment {
        app_id: u64,
        record_id: u64,
        field_key: String,
    },
    FileKey {
        file_key: String,
    },
    Url {
        url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FontSource {
    Standard { standard: StandardFont },
    /// TrueType/OpenType font bytes, embedded whole
    Embedded(AssetSource),
}

impl Default for FontSource {
    fn default() -> Self {
        FontSource::Standard {
            standard: StandardFont::Helvetica,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_invoice_number_field")]
    pub invoice_number_field: String,
    #[serde(default = "default_file_name_prefix")]
    pub file_name_prefix: String,
}

fn default_invoice_number_field() -> String {
    "invoice_number".to_string()
}

fn default_file_name_prefix() -> String {
    "invoice_".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            invoice_number_field: default_invoice_number_field(),
            file_name_prefix: default_file_name_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    /// `x` names the right edge of the text
    Right,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    #[default]
    None,
    /// Group the integer part with commas: 1234567 -> 1,234,567
    Thousands,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageTarget {
    All,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtotalMode {
    /// Sum numeric values; non-numeric values add one
    Sum,
    /// Add one per row regardless of value
    Count,
}

/// Text color as 0-255 channels. Missing channels are 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextColor {
    #[serde(default)]
    pub red: Option<u32>,
    #[serde(default)]
    pub green: Option<u32>,
    #[serde(default)]
    pub blue: Option<u32>,
}

impl TextColor {
    pub fn rgb(red: u32, green: u32, blue: u32) -> Self {
        Self {
            red: Some(red),
            green: Some(green),
            blue: Some(blue),
        }
    }

    /// Normalize to PDF color components in 0..=1
    pub fn to_components(&self) -> [f32; 3] {
        [
            normalize_channel(self.red),
            normalize_channel(self.green),
            normalize_channel(self.blue),
        ]
    }
}

fn normalize_channel(value: Option<u32>) -> f32 {
    match value {
        Some(v) if v > 255 => 1.0,
        Some(v) => v as f32 / 255.0,
        None => 0.0,
    }
}

/// One positioned line of text sourced from a record field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldPlacement {
    pub field_key: String,
    pub x: f32,
    /// Ignored for table columns, whose y comes from the row cursor
    #[serde(default)]
    pub y: f32,
    pub font_size: f32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default)]
    pub format: NumberFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<TextColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_page: Option<PageTarget>,
}

impl FieldPlacement {
    pub fn new(field_key: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        Self {
            field_key: field_key.into(),
            x,
            y,
            font_size,
            alignment: Alignment::Left,
            prefix: None,
            suffix: None,
            format: NumberFormat::None,
            color: None,
            max_width: None,
            target_page: None,
        }
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(LayoutError::InvalidConfig(format!(
                "{}: font_size must be positive, got {}",
                self.field_key, self.font_size
            )));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(LayoutError::InvalidConfig(format!(
                "{}: coordinates must be finite",
                self.field_key
            )));
        }
        if let Some(max_width) = self.max_width {
            if !(max_width.is_finite() && max_width > 0.0) {
                return Err(LayoutError::InvalidConfig(format!(
                    "{}: max_width must be positive, got {}",
                    self.field_key, max_width
                )));
            }
        }
        Ok(())
    }
}

/// A page-break table column: a field placement plus an optional subtotal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableColumnConfig {
    #[serde(flatten)]
    pub field: FieldPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<SubtotalMode>,
}

impl TableColumnConfig {
    pub fn new(field: FieldPlacement) -> Self {
        Self {
            field,
            subtotal: None,
        }
    }

    pub fn with_subtotal(mut self, mode: SubtotalMode) -> Self {
        self.subtotal = Some(mode);
        self
    }
}

/// How far the row cursor moves down after each row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RowOffset {
    Fixed { offset: f32 },
    /// Tallest line height in the row plus `extra`
    LineHeight {
        #[serde(default)]
        extra: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableConfig {
    /// Array-valued record field holding the rows
    pub field_key: String,
    pub start_y: f32,
    pub row_offset: RowOffset,
    pub columns: Vec<FieldPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_page: Option<PageTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageBreakTableConfig {
    pub field_key: String,
    pub max_rows_per_page: usize,
    pub start_y: f32,
    pub row_offset: RowOffset,
    pub columns: Vec<TableColumnConfig>,
    /// Draw a subtotal row after the last row of the table
    #[serde(default)]
    pub subtotal: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImageScale {
    /// Multipliers of the image's natural size; height defaults to width
    Ratio {
        width: f32,
        #[serde(default)]
        height: Option<f32>,
    },
    /// Target size in points; a missing height keeps the aspect ratio
    Absolute {
        width: f32,
        #[serde(default)]
        height: Option<f32>,
    },
}

impl ImageScale {
    /// Resolve the drawn size for an image of the given natural size
    pub fn resolve(&self, natural_width: f32, natural_height: f32) -> (f32, f32) {
        match *self {
            ImageScale::Ratio { width, height } => (
                natural_width * width,
                natural_height * height.unwrap_or(width),
            ),
            ImageScale::Absolute { width, height } => {
                let height = height.unwrap_or_else(|| {
                    if natural_width > 0.0 {
                        natural_height * width / natural_width
                    } else {
                        0.0
                    }
                });
                (width, height)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagePlacement {
    /// Attachment field holding the PNG
    pub field_key: String,
    pub x: f32,
    pub y: f32,
    pub scale: ImageScale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_page: Option<PageTarget>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageNumberStyle {
    /// "P1", "P2", ...
    #[default]
    Prefixed,
    /// "1 / 3"
    OfTotal,
}

impl PageNumberStyle {
    pub fn label(&self, page_index: usize, total_pages: usize) -> String {
        match self {
            PageNumberStyle::Prefixed => format!("P{}", page_index + 1),
            PageNumberStyle::OfTotal => format!("{} / {}", page_index + 1, total_pages),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageNumberConfig {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<TextColor>,
    #[serde(default)]
    pub style: PageNumberStyle,
}

impl PageNumberConfig {
    /// The stamp as a text placement reading `PAGE_NUMBER_FIELD`
    pub fn placement(&self) -> FieldPlacement {
        FieldPlacement {
            alignment: self.alignment,
            color: self.color,
            ..FieldPlacement::new(PAGE_NUMBER_FIELD, self.x, self.y, self.font_size)
        }
    }
}

impl LayoutConfig {
    /// A config with only a template and the default font
    pub fn new(template: AssetSource) -> Self {
        Self {
            template,
            font: FontSource::default(),
            output: OutputConfig::default(),
            text: Vec::new(),
            images: Vec::new(),
            tables: Vec::new(),
            page_break_table: None,
            page_number: None,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, LayoutError> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| LayoutError::InvalidConfig(format!("JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, LayoutError> {
        let config: Self =
            toml::from_str(s).map_err(|e| LayoutError::InvalidConfig(format!("TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        for field in &self.text {
            field.validate()?;
        }
        for image in &self.images {
            let (width, height) = match image.scale {
                ImageScale::Ratio { width, height } | ImageScale::Absolute { width, height } => {
                    (width, height)
                }
            };
            if !(width.is_finite() && width > 0.0) || height.is_some_and(|h| !(h > 0.0)) {
                return Err(LayoutError::InvalidConfig(format!(
                    "{}: image scale must be positive",
                    image.field_key
                )));
            }
        }
        for table in &self.tables {
            validate_row_offset(&table.field_key, &table.row_offset)?;
            for column in &table.columns {
                column.validate()?;
            }
        }
        if let Some(table) = &self.page_break_table {
            if table.max_rows_per_page == 0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{}: max_rows_per_page must be at least 1",
                    table.field_key
                )));
            }
            validate_row_offset(&table.field_key, &table.row_offset)?;
            for column in &table.columns {
                column.field.validate()?;
            }
        }
        if let Some(page_number) = &self.page_number {
            page_number.placement().validate()?;
        }
        Ok(())
    }
}

fn validate_row_offset(field_key: &str, offset: &RowOffset) -> Result<(), LayoutError> {
    let value = match *offset {
        RowOffset::Fixed { offset } => offset,
        RowOffset::LineHeight { extra } => extra,
    };
    if value.is_finite() {
        Ok(())
    } else {
        Err(LayoutError::InvalidConfig(format!(
            "{}: row offset must be finite",
            field_key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const JSON: &str = r#"{
        "template": {"kind": "attachment", "app_id": 2589, "record_id": 9, "field_key": "attachment"},
        "font": {"kind": "url", "url": "https://example.com/fonts/gothic.ttf"},
        "text": [
            {"field_key": "company", "x": 100, "y": 755, "font_size": 12, "target_page": "all"},
            {"field_key": "total", "x": 220, "y": 620, "font_size": 16, "suffix": " JPY",
             "format": "thousands", "alignment": "right", "target_page": "last"}
        ],
        "images": [
            {"field_key": "signature", "x": 385, "y": 175, "scale": {"mode": "ratio", "width": 0.3}}
        ],
        "page_break_table": {
            "field_key": "lines",
            "max_rows_per_page": 17,
            "start_y": 503,
            "row_offset": {"mode": "fixed", "offset": 14.8},
            "subtotal": true,
            "columns": [
                {"field_key": "item", "x": 83, "font_size": 12, "max_width": 210, "subtotal": "count"},
                {"field_key": "amount", "x": 510, "font_size": 12, "format": "thousands",
                 "alignment": "right", "subtotal": "sum"}
            ]
        },
        "page_number": {"x": 300, "y": 10, "font_size": 12, "style": "of_total"}
    }"#;

    #[test]
    fn test_parse_json_config() {
        let config = LayoutConfig::from_json_str(JSON).unwrap();
        assert_eq!(
            config.template,
            AssetSource::Attachment {
                app_id: 2589,
                record_id: 9,
                field_key: "attachment".into()
            }
        );
        assert!(matches!(config.font, FontSource::Embedded(AssetSource::Url { .. })));
        assert_eq!(config.text[1].alignment, Alignment::Right);
        assert_eq!(config.text[1].format, NumberFormat::Thousands);

        let table = config.page_break_table.unwrap();
        assert_eq!(table.max_rows_per_page, 17);
        assert_eq!(table.row_offset, RowOffset::Fixed { offset: 14.8 });
        assert_eq!(table.columns[0].subtotal, Some(SubtotalMode::Count));
        assert_eq!(table.columns[0].field.max_width, Some(210.0));
        assert_eq!(table.columns[1].subtotal, Some(SubtotalMode::Sum));
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_parse_toml_config_with_standard_font() {
        let toml = r#"
            font = { standard = "courier" }

            [template]
            kind = "file_key"
            file_key = "template.pdf"

            [[tables]]
            field_key = "history"
            start_y = 150
            row_offset = { mode = "line_height", extra = 1 }
            target_page = "last"

            [[tables.columns]]
            field_key = "date"
            x = 80
            font_size = 12
        "#;
        let config = LayoutConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.font,
            FontSource::Standard {
                standard: StandardFont::Courier
            }
        );
        assert_eq!(
            config.tables[0].row_offset,
            RowOffset::LineHeight { extra: 1.0 }
        );
        assert_eq!(config.tables[0].target_page, Some(PageTarget::Last));
    }

    #[test]
    fn test_default_font_is_helvetica() {
        let config = LayoutConfig::from_json_str(
            r#"{"template": {"kind": "file_key", "file_key": "t.pdf"}}"#,
        )
        .unwrap();
        assert_eq!(config.font, FontSource::default());
        assert!(config.page_break_table.is_none());
    }

    #[test]
    fn test_zero_rows_per_page_rejected() {
        let json = r#"{
            "template": {"kind": "file_key", "file_key": "t.pdf"},
            "page_break_table": {"field_key": "lines", "max_rows_per_page": 0, "start_y": 500,
                                 "row_offset": {"mode": "fixed", "offset": 14}, "columns": []}
        }"#;
        let err = LayoutConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_positive_font_size_rejected() {
        let mut config = LayoutConfig::new(AssetSource::FileKey {
            file_key: "t.pdf".into(),
        });
        config.text.push(FieldPlacement::new("name", 10.0, 10.0, 0.0));
        assert!(matches!(
            config.validate(),
            Err(LayoutError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_color_channels_normalize_and_clamp() {
        assert_eq!(TextColor::rgb(255, 0, 0).to_components(), [1.0, 0.0, 0.0]);
        assert_eq!(TextColor::rgb(300, 0, 0).to_components(), [1.0, 0.0, 0.0]);
        let partial = TextColor {
            red: None,
            green: Some(51),
            blue: None,
        };
        assert_eq!(partial.to_components(), [0.0, 0.2, 0.0]);
    }

    #[test]
    fn test_image_scale_resolution() {
        let ratio = ImageScale::Ratio {
            width: 0.5,
            height: None,
        };
        assert_eq!(ratio.resolve(200.0, 100.0), (100.0, 50.0));

        let stretched = ImageScale::Ratio {
            width: 0.5,
            height: Some(2.0),
        };
        assert_eq!(stretched.resolve(200.0, 100.0), (100.0, 200.0));

        let absolute = ImageScale::Absolute {
            width: 110.0,
            height: None,
        };
        assert_eq!(absolute.resolve(220.0, 100.0), (110.0, 50.0));
    }

    #[test]
    fn test_page_number_labels() {
        assert_eq!(PageNumberStyle::Prefixed.label(0, 3), "P1");
        assert_eq!(PageNumberStyle::OfTotal.label(1, 3), "2 / 3");
    }
}
