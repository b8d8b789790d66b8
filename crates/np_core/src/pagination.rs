use serde::{Deserialize, Serialize};

const MAX_VISIBLE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub page: u32,
    pub href: String,
    pub current: bool,
}

/// Navigation links for a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub previous: Option<PageLink>,
    /// Link back to page 1 when the window does not already include it
    pub first: Option<PageLink>,
    pub leading_gap: bool,
    pub pages: Vec<PageLink>,
    pub trailing_gap: bool,
    /// Link to the last page when the window does not already include it
    pub last: Option<PageLink>,
    pub next: Option<PageLink>,
}

impl PageLinks {
    /// Builds a window of at most five page links around `current_page`.
    /// Returns empty links when there is only one page.
    pub fn build(current_page: u32, total_pages: u32, base_path: &str) -> Self {
        if total_pages <= 1 {
            return Self::default();
        }

        // a page past the end anchors the window on the last page
        let anchor = current_page.clamp(1, total_pages);
        let mut start = anchor.saturating_sub(MAX_VISIBLE / 2).max(1);
        let end = start.saturating_add(MAX_VISIBLE - 1).min(total_pages);
        if end - start < MAX_VISIBLE - 1 {
            start = end.saturating_sub(MAX_VISIBLE - 1).max(1);
        }

        let link = |page: u32| PageLink {
            page,
            href: page_href(base_path, page),
            current: page == current_page,
        };

        Self {
            previous: (current_page > 1).then(|| link(current_page - 1)),
            first: (start > 1).then(|| link(1)),
            leading_gap: start > 2,
            pages: (start..=end).map(link).collect(),
            trailing_gap: end < total_pages - 1,
            last: (end < total_pages).then(|| link(total_pages)),
            next: (current_page < total_pages).then(|| link(current_page + 1)),
        }
    }
}

/// Page 1 is the bare base path; later pages carry a `page` query parameter.
pub fn page_href(base_path: &str, page: u32) -> String {
    if page <= 1 {
        base_path.to_string()
    } else {
        format!("{}?page={}", base_path, page)
    }
}
