use crate::config::PageTarget;

/// Whether an element restricted to `target` draws on page `page_index` of `total_pages`
pub fn is_target_page(target: Option<PageTarget>, page_index: usize, total_pages: usize) -> bool {
    match target {
        None | Some(PageTarget::All) => true,
        Some(PageTarget::First) => page_index == 0,
        Some(PageTarget::Last) => page_index + 1 == total_pages,
    }
}
