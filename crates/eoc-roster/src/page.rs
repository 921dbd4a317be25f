//! ---
//! eoc_section: "04-roster-queries"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster sorting, pagination, and duplicate checks."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---

/// One page of a listing, with enough metadata to render a pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Rows on this page, in listing order.
    pub items: Vec<T>,
    /// The 1-indexed page actually returned, after clamping.
    pub page: usize,
    /// Total pages at the requested page size; at least 1.
    pub total_pages: usize,
    /// Total rows across all pages.
    pub total_items: usize,
}

/// Slice a listing into a 1-indexed page, clamping out-of-range requests.
pub fn page_slice<T: Clone>(rows: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = rows.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let items = rows
        .iter()
        .skip(start)
        .take(per_page)
        .cloned()
        .collect::<Vec<_>>();
    Page {
        items,
        page,
        total_pages,
        total_items,
    }
}
