//! The layout engine
//!
//! Pure helpers (`text`, `offset`, `subtotal`, `target`) take every input
//! explicitly. `paginate` drives them page by page over a template.

pub mod offset;
pub mod paginate;
pub mod subtotal;
pub mod target;
pub mod text;

pub use offset::next_row_offset;
pub use paginate::{paginate, total_pages, PaginationState, Phase, RenderOutcome, RenderWarning};
pub use subtotal::SubtotalAccumulator;
pub use target::is_target_page;
pub use text::{render_field, TextContext};
