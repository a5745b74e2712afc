//! Single-line text rendering with bounds checking

use crate::config::{Alignment, FieldPlacement, NumberFormat};
use crate::error::LayoutError;
use crate::format::format_thousands;
use crate::pdf::{Font, PageCanvas};
use crate::record::Record;

/// The page and font a field is drawn with
pub struct TextContext<'a> {
    pub canvas: &'a mut PageCanvas,
    pub font: &'a Font,
}

impl<'a> TextContext<'a> {
    pub fn new(canvas: &'a mut PageCanvas, font: &'a Font) -> Self {
        Self { canvas, font }
    }
}

/// Draw `placement`'s value from `scope` at height `y` and return the line height.
///
/// Fails with `OutOfBounds` when the text box leaves the page.
pub fn render_field(
    ctx: &mut TextContext<'_>,
    placement: &FieldPlacement,
    scope: &Record,
    y: f32,
) -> Result<f32, LayoutError> {
    let size = placement.font_size;
    let raw = scope.text(&placement.field_key);
    let value = match placement.format {
        NumberFormat::Thousands => format_thousands(&raw),
        NumberFormat::None => raw,
    };
    let mut text = format!(
        "{}{}{}",
        placement.prefix.as_deref().unwrap_or_default(),
        value,
        placement.suffix.as_deref().unwrap_or_default()
    );

    if let Some(max_width) = placement.max_width {
        text = truncate_to_width(ctx.font, &text, size, max_width);
    }

    let width = ctx.font.width_of_text_at_size(&text, size);
    let height = ctx.font.height_at_size(size);
    let (draw_x, box_x, box_width) = match placement.alignment {
        Alignment::Left => (placement.x, placement.x, placement.max_width.unwrap_or(width)),
        Alignment::Right => {
            let box_width = placement.max_width.unwrap_or(width);
            (placement.x - width, placement.x - box_width, box_width)
        }
    };

    check_bounds(
        &placement.field_key,
        box_x,
        y,
        box_width,
        height,
        ctx.canvas.width(),
        ctx.canvas.height(),
    )?;

    if !text.is_empty() {
        let color = placement.color.unwrap_or_default().to_components();
        ctx.canvas.draw_text(ctx.font, &text, draw_x, y, size, color);
    }

    Ok(height)
}

/// Cut `text` to the number of characters that fit in `max_width`,
/// estimated from its average character width.
pub fn truncate_to_width(font: &Font, text: &str, size: f32, max_width: f32) -> String {
    let width = font.width_of_text_at_size(text, size);
    if width <= max_width {
        return text.to_string();
    }
    let chars = text.chars().count();
    let average = width / chars as f32;
    let fit = (max_width / average).floor().max(0.0) as usize;
    text.chars().take(fit).collect()
}

/// Reject a box that is not fully inside a `page_width` x `page_height` page
pub fn check_bounds(
    field: &str,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    page_width: f32,
    page_height: f32,
) -> Result<(), LayoutError> {
    if x < 0.0 || y < 0.0 || x + width > page_width || y + height > page_height {
        return Err(LayoutError::OutOfBounds {
            field: field.to_string(),
            x,
            y,
            width,
            height,
            page_width,
            page_height,
        });
    }
    Ok(())
}
