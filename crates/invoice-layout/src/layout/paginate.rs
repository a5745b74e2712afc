//! Page-by-page rendering of a layout over a template
//!
//! Every output page draws, in order: the page-number stamp, fixed text,
//! images, fixed tables, the page-break table's row window, and (on the
//! final page) the subtotal row. Pages after the first are copies of the
//! previous page as it was before anything was drawn on it.

use super::offset::next_row_offset;
use super::subtotal::SubtotalAccumulator;
use super::target::is_target_page;
use super::text::{render_field, TextContext};
use crate::config::{
    Alignment, FieldPlacement, ImagePlacement, LayoutConfig, NumberFormat, PageBreakTableConfig,
    RowOffset, TableConfig, PAGE_NUMBER_FIELD,
};
use crate::error::LayoutError;
use crate::host::Host;
use crate::pdf::{Font, ImageHandle, PageCanvas, PageSnapshot, TemplateDocument};
use crate::record::Record;
use serde::Serialize;
use tracing::{debug, warn};

/// Number of output pages for a page-break table with `row_count` rows
pub fn total_pages(row_count: usize, max_rows_per_page: usize) -> usize {
    if row_count == 0 {
        1
    } else {
        row_count.div_ceil(max_rows_per_page.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RenderingPage,
    AllocatingNextPage,
    Done,
}

/// Cursor state of one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: usize,
    /// Index of the first page-break table row not yet drawn
    pub next_row: usize,
    pub total_pages: usize,
    pub phase: Phase,
}

impl PaginationState {
    pub fn new(total_pages: usize) -> Self {
        Self {
            current_page: 0,
            next_row: 0,
            total_pages,
            phase: Phase::RenderingPage,
        }
    }

    fn is_last_page(&self) -> bool {
        self.current_page + 1 >= self.total_pages
    }
}

/// A non-fatal problem, reported alongside the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderWarning {
    pub field_key: String,
    pub message: String,
}

impl From<LayoutError> for RenderWarning {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::ImageEmbed { field, reason } => Self {
                field_key: field,
                message: reason,
            },
            other => Self {
                field_key: String::new(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub page_count: usize,
    pub warnings: Vec<RenderWarning>,
}

/// Images are fetched and embedded the first time a page needs them
enum ImageSlot {
    Pending,
    Ready(ImageHandle),
    Skipped,
}

struct Renderer<'a> {
    doc: &'a mut TemplateDocument,
    font: &'a Font,
    config: &'a LayoutConfig,
    record: &'a Record,
    host: &'a dyn Host,
    rows: Vec<Record>,
    subtotals: SubtotalAccumulator,
    images: Vec<ImageSlot>,
    warnings: Vec<RenderWarning>,
}

/// Draw `config` for `record` into `doc`, adding pages as the page-break table needs.
///
/// Any error other than an image failure aborts the render.
pub async fn paginate(
    doc: &mut TemplateDocument,
    font: &Font,
    config: &LayoutConfig,
    record: &Record,
    host: &dyn Host,
) -> Result<RenderOutcome, LayoutError> {
    let rows = config
        .page_break_table
        .as_ref()
        .map(|table| record.rows(&table.field_key))
        .unwrap_or_default();
    let total = match &config.page_break_table {
        Some(table) => total_pages(rows.len(), table.max_rows_per_page),
        None => 1,
    };

    doc.embed_font();
    let mut renderer = Renderer {
        doc,
        font,
        config,
        record,
        host,
        rows,
        subtotals: SubtotalAccumulator::new(),
        images: config.images.iter().map(|_| ImageSlot::Pending).collect(),
        warnings: Vec::new(),
    };

    let mut state = PaginationState::new(total);
    let mut snapshot: Option<PageSnapshot> = None;
    loop {
        match state.phase {
            Phase::RenderingPage => {
                snapshot = Some(renderer.doc.snapshot_page(state.current_page)?);
                renderer.render_page(&mut state).await?;
                state.phase = if state.is_last_page() {
                    Phase::Done
                } else {
                    Phase::AllocatingNextPage
                };
            }
            Phase::AllocatingNextPage => {
                let previous = snapshot.take().ok_or_else(|| {
                    LayoutError::Operation("no snapshot of the previous page".into())
                })?;
                state.current_page += 1;
                renderer.doc.insert_page(state.current_page, &previous)?;
                state.phase = Phase::RenderingPage;
            }
            Phase::Done => break,
        }
    }

    Ok(RenderOutcome {
        page_count: renderer.doc.page_count(),
        warnings: renderer.warnings,
    })
}

impl Renderer<'_> {
    async fn render_page(&mut self, state: &mut PaginationState) -> Result<(), LayoutError> {
        let config = self.config;
        let page = state.current_page;
        let total = state.total_pages;
        let mut canvas = self.doc.begin_page(page)?;
        debug!(page = page + 1, total, "rendering page");

        if let Some(page_number) = &config.page_number {
            let label = page_number.style.label(page, total);
            let scope = Record::new().with(PAGE_NUMBER_FIELD, label);
            let placement = page_number.placement();
            render_field(&mut self.text(&mut canvas), &placement, &scope, placement.y)?;
        }

        for placement in &config.text {
            if is_target_page(placement.target_page, page, total) {
                render_field(&mut self.text(&mut canvas), placement, self.record, placement.y)?;
            }
        }

        for (index, placement) in config.images.iter().enumerate() {
            if !is_target_page(placement.target_page, page, total) {
                continue;
            }
            if let Some(handle) = self.image(index).await {
                let (width, height) = placement
                    .scale
                    .resolve(handle.width as f32, handle.height as f32);
                canvas.draw_image(&handle, placement.x, placement.y, width, height);
            }
        }

        for table in &config.tables {
            if is_target_page(table.target_page, page, total) {
                self.render_table(&mut canvas, table)?;
            }
        }

        if let Some(table) = &config.page_break_table {
            self.render_page_break_rows(&mut canvas, table, state)?;
        }

        self.doc.commit_page(canvas)
    }

    fn text<'c>(&'c self, canvas: &'c mut PageCanvas) -> TextContext<'c> {
        TextContext::new(canvas, self.font)
    }

    fn render_table(
        &self,
        canvas: &mut PageCanvas,
        table: &TableConfig,
    ) -> Result<(), LayoutError> {
        let mut y = table.start_y;
        for row in self.record.rows(&table.field_key) {
            let mut line_height: f32 = 0.0;
            for column in &table.columns {
                let height = render_field(&mut self.text(canvas), column, &row, y)?;
                line_height = line_height.max(height);
            }
            y -= next_row_offset(&table.row_offset, line_height);
        }
        Ok(())
    }

    fn render_page_break_rows(
        &mut self,
        canvas: &mut PageCanvas,
        table: &PageBreakTableConfig,
        state: &mut PaginationState,
    ) -> Result<(), LayoutError> {
        let start = state.next_row;
        let end = (start + table.max_rows_per_page).min(self.rows.len());
        debug!(page = state.current_page + 1, start, end, "page-break table rows");

        let mut y = table.start_y;
        for row in &self.rows[start..end] {
            let mut line_height: f32 = 0.0;
            for column in &table.columns {
                let mut ctx = TextContext::new(canvas, self.font);
                line_height = line_height.max(render_field(&mut ctx, &column.field, row, y)?);
                self.subtotals.accumulate(column, row);
            }
            y -= next_row_offset(&table.row_offset, line_height);
        }
        state.next_row = end;

        if table.subtotal && state.next_row >= self.rows.len() {
            let y = match table.row_offset {
                RowOffset::Fixed { offset } => {
                    table.start_y - offset * table.max_rows_per_page as f32
                }
                RowOffset::LineHeight { .. } => y,
            };
            let columns = table.columns.iter().filter(|c| c.subtotal.is_some());
            let mut totals = Record::new();
            for column in columns.clone() {
                let key = &column.field.field_key;
                totals.insert(key.clone(), self.subtotals.total(key));
            }
            for column in columns {
                let placement = subtotal_placement(&column.field);
                render_field(&mut TextContext::new(canvas, self.font), &placement, &totals, y)?;
            }
        }
        Ok(())
    }

    /// Handle for image `index`, fetching and embedding it on first use
    async fn image(&mut self, index: usize) -> Option<ImageHandle> {
        match &self.images[index] {
            ImageSlot::Ready(handle) => return Some(handle.clone()),
            ImageSlot::Skipped => return None,
            ImageSlot::Pending => {}
        }

        let config = self.config;
        let placement = &config.images[index];
        let slot = match self.load_image(placement).await {
            Ok(Some(handle)) => ImageSlot::Ready(handle),
            Ok(None) => {
                debug!(field = %placement.field_key, "no image attached");
                ImageSlot::Skipped
            }
            Err(err) => {
                warn!(field = %placement.field_key, error = %err, "skipping image");
                self.warnings.push(err.into());
                ImageSlot::Skipped
            }
        };
        self.images[index] = slot;
        match &self.images[index] {
            ImageSlot::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    async fn load_image(
        &mut self,
        placement: &ImagePlacement,
    ) -> Result<Option<ImageHandle>, LayoutError> {
        let image_error = |reason: String| LayoutError::ImageEmbed {
            field: placement.field_key.clone(),
            reason,
        };
        let Some(file_key) = self.record.first_file_key(&placement.field_key) else {
            return Ok(None);
        };
        let bytes = self
            .host
            .fetch_file_bytes(&file_key)
            .await
            .map_err(|e| image_error(e.to_string()))?;
        self.doc.embed_png(&bytes).map(Some).map_err(image_error)
    }
}

/// The placement a subtotal is drawn with: always comma-grouped, and
/// right-aligned to the end of the column when the column has a width.
fn subtotal_placement(column: &FieldPlacement) -> FieldPlacement {
    let mut placement = column.clone();
    placement.format = NumberFormat::Thousands;
    if let Some(max_width) = placement.max_width.take() {
        placement.x += max_width;
        placement.alignment = Alignment::Right;
    }
    placement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssetSource, PageTarget, TableColumnConfig};
    use crate::host::MemoryHost;
    use crate::pdf::tests::{create_template, page_texts};
    use crate::pdf::StandardFont;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn config() -> LayoutConfig {
        LayoutConfig::new(AssetSource::FileKey {
            file_key: "template".into(),
        })
    }

    async fn run(
        config: &LayoutConfig,
        record: &Record,
        pages: usize,
    ) -> (RenderOutcome, Vec<Vec<String>>) {
        let font = Font::standard(StandardFont::Helvetica);
        let mut doc = TemplateDocument::load(&create_template(pages)).unwrap();
        let outcome = paginate(&mut doc, &font, config, record, &MemoryHost::new())
            .await
            .unwrap();
        let bytes = doc.save(&font).unwrap();
        (outcome, page_texts(&bytes))
    }

    fn drawn(page: &[String]) -> Vec<&str> {
        page.iter()
            .map(String::as_str)
            .filter(|text| !text.starts_with("TEMPLATE"))
            .collect()
    }

    fn items(count: usize) -> Vec<serde_json::Value> {
        (0..count)
            .map(|i| {
                serde_json::json!({
                    "id": i.to_string(),
                    "value": {"name": {"value": format!("item{}", i)}},
                })
            })
            .collect()
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 17), 1);
        assert_eq!(total_pages(1, 17), 1);
        assert_eq!(total_pages(17, 17), 1);
        assert_eq!(total_pages(18, 17), 2);
        assert_eq!(total_pages(34, 17), 2);
    }

    #[test]
    fn test_subtotal_placement_right_aligns_at_column_end() {
        let mut column = FieldPlacement::new("amount", 400.0, 0.0, 10.0);
        column.max_width = Some(80.0);
        column.prefix = Some("$".into());
        let placement = subtotal_placement(&column);
        assert_eq!(placement.x, 480.0);
        assert_eq!(placement.alignment, Alignment::Right);
        assert_eq!(placement.max_width, None);
        assert_eq!(placement.format, NumberFormat::Thousands);
        assert_eq!(placement.prefix.as_deref(), Some("$"));
    }

    #[tokio::test]
    async fn test_without_table_renders_one_page() {
        let mut config = config();
        config.text.push(FieldPlacement::new("customer", 50.0, 700.0, 12.0));
        let record = Record::new().with("customer", "ACME");

        let (outcome, pages) = run(&config, &record, 1).await;
        assert_eq!(outcome.page_count, 1);
        assert_eq!(drawn(&pages[0]), vec!["ACME"]);
    }

    #[tokio::test]
    async fn test_page_targets_across_three_pages() {
        let mut config = config();
        let mut first = FieldPlacement::new("first", 50.0, 780.0, 10.0);
        first.target_page = Some(PageTarget::First);
        let mut last = FieldPlacement::new("last", 50.0, 760.0, 10.0);
        last.target_page = Some(PageTarget::Last);
        let every = FieldPlacement::new("every", 50.0, 740.0, 10.0);
        config.text = vec![first, last, every];
        config.page_break_table = Some(PageBreakTableConfig {
            field_key: "items".into(),
            max_rows_per_page: 2,
            start_y: 600.0,
            row_offset: RowOffset::Fixed { offset: 20.0 },
            columns: vec![TableColumnConfig::new(FieldPlacement::new("name", 50.0, 0.0, 10.0))],
            subtotal: false,
        });
        let record = Record::new()
            .with("first", "F")
            .with("last", "L")
            .with("every", "E")
            .with("items", items(5));

        let (outcome, pages) = run(&config, &record, 1).await;
        assert_eq!(outcome.page_count, 3);
        assert_eq!(drawn(&pages[0]), vec!["F", "E", "item0", "item1"]);
        assert_eq!(drawn(&pages[1]), vec!["E", "item2", "item3"]);
        assert_eq!(drawn(&pages[2]), vec!["L", "E", "item4"]);
    }

    #[tokio::test]
    async fn test_page_numbers() {
        let mut config = config();
        config.page_number = Some(crate::config::PageNumberConfig {
            x: 500.0,
            y: 20.0,
            font_size: 9.0,
            alignment: Alignment::Right,
            color: None,
            style: crate::config::PageNumberStyle::OfTotal,
        });
        config.page_break_table = Some(PageBreakTableConfig {
            field_key: "items".into(),
            max_rows_per_page: 1,
            start_y: 600.0,
            row_offset: RowOffset::LineHeight { extra: 2.0 },
            columns: vec![TableColumnConfig::new(FieldPlacement::new("name", 50.0, 0.0, 10.0))],
            subtotal: false,
        });
        let record = Record::new().with("items", items(2));

        let (_, pages) = run(&config, &record, 1).await;
        assert_eq!(drawn(&pages[0]), vec!["1 / 2", "item0"]);
        assert_eq!(drawn(&pages[1]), vec!["2 / 2", "item1"]);
    }

    #[tokio::test]
    async fn test_trailing_template_pages_are_kept() {
        let mut config = config();
        config.page_break_table = Some(PageBreakTableConfig {
            field_key: "items".into(),
            max_rows_per_page: 1,
            start_y: 600.0,
            row_offset: RowOffset::Fixed { offset: 15.0 },
            columns: vec![TableColumnConfig::new(FieldPlacement::new("name", 50.0, 0.0, 10.0))],
            subtotal: false,
        });
        let record = Record::new().with("items", items(2));

        let (outcome, pages) = run(&config, &record, 2).await;
        assert_eq!(outcome.page_count, 3);
        assert_eq!(pages[0], vec!["TEMPLATE 1", "item0"]);
        assert_eq!(pages[1], vec!["TEMPLATE 1", "item1"]);
        assert_eq!(pages[2], vec!["TEMPLATE 2"]);
    }

    #[tokio::test]
    async fn test_fixed_table_renders_all_rows() {
        let mut config = config();
        config.tables.push(TableConfig {
            field_key: "notes".into(),
            start_y: 300.0,
            row_offset: RowOffset::Fixed { offset: 12.0 },
            columns: vec![FieldPlacement::new("text", 40.0, 0.0, 8.0)],
            target_page: None,
        });
        let record = Record::new().with(
            "notes",
            serde_json::json!([{"text": "one"}, {"text": "two"}, {"text": "three"}]),
        );

        let (_, pages) = run(&config, &record, 1).await;
        assert_eq!(drawn(&pages[0]), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_subtotal_with_no_rows_draws_zero() {
        let mut config = config();
        config.page_break_table = Some(PageBreakTableConfig {
            field_key: "items".into(),
            max_rows_per_page: 10,
            start_y: 600.0,
            row_offset: RowOffset::Fixed { offset: 15.0 },
            columns: vec![TableColumnConfig::new(FieldPlacement::new("amount", 400.0, 0.0, 10.0))
                .with_subtotal(crate::config::SubtotalMode::Sum)],
            subtotal: true,
        });

        let (outcome, pages) = run(&config, &Record::new(), 1).await;
        assert_eq!(outcome.page_count, 1);
        assert_eq!(drawn(&pages[0]), vec!["0"]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_aborts() {
        let mut config = config();
        config.text.push(FieldPlacement::new("customer", 590.0, 700.0, 12.0));
        let record = Record::new().with("customer", "ACME");

        let font = Font::standard(StandardFont::Helvetica);
        let mut doc = TemplateDocument::load(&create_template(1)).unwrap();
        let err = paginate(&mut doc, &font, &config, &record, &MemoryHost::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LayoutError::OutOfBounds { field, .. } if field == "customer"));
    }

    proptest! {
        #[test]
        fn prop_total_pages_matches_ceiling(rows in 0usize..500, max in 1usize..50) {
            let pages = total_pages(rows, max);
            if rows == 0 {
                prop_assert_eq!(pages, 1);
            } else {
                prop_assert!(pages * max >= rows);
                prop_assert!((pages - 1) * max < rows);
            }
        }
    }
}
