//! Invoice layout engine
//!
//! Populates a template PDF from a host record according to a declarative
//! `LayoutConfig`: positioned text fields, images, fixed tables, and one
//! page-break-aware table whose rows flow over as many pages as they need,
//! with subtotals after the last row.
//!
//! Entry point is `render_invoice`; the host platform is reached through the
//! `Host` trait.

pub mod config;
pub mod error;
pub mod format;
pub mod host;
pub mod layout;
pub mod pdf;
pub mod record;
pub mod render;

pub use config::{
    Alignment, AssetSource, FieldPlacement, FontSource, ImagePlacement, ImageScale, LayoutConfig,
    NumberFormat, OutputConfig, PageBreakTableConfig, PageNumberConfig, PageNumberStyle,
    PageTarget, RowOffset, SubtotalMode, TableColumnConfig, TableConfig, TextColor,
};
pub use error::LayoutError;
pub use host::{Host, MemoryHost};
#[cfg(feature = "http")]
pub use host::RestHost;
pub use layout::{RenderOutcome, RenderWarning};
pub use pdf::StandardFont;
pub use record::Record;
pub use render::{output_file_name, render_invoice, RenderedDocument};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, LayoutError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| LayoutError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
