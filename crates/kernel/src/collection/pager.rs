//! Page windows and navigation links.

use super::filter::PAGE_PARAM;
use super::links::{LinkKind, LinkSet, PageRelation, UrlBuilder, build_link};
use super::types::{ExecutionResult, PagerStyle, QueryDefinition};
use crate::error::ValidationError;

/// Upper bound on `items_per_page`; larger values are capped at registration.
pub const MAX_ITEMS_PER_PAGE: u32 = 100;

/// Rows covered by one page, and whether neighbours exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Offset of the first row.
    pub offset: u64,
    /// Number of rows inside the window.
    pub limit: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageWindow {
    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }
}

/// Compute the window for a zero-indexed page over a known total.
///
/// Pages past the end yield an empty window with `has_next == false`.
pub fn compute_window(page_size: u32, requested_page: u32, total_count: u64) -> PageWindow {
    let size = u64::from(page_size);
    let page = u64::from(requested_page);
    let offset = page.saturating_mul(size);

    PageWindow {
        offset,
        limit: size.min(total_count.saturating_sub(offset)),
        has_prev: requested_page > 0,
        has_next: size > 0 && (page + 1).saturating_mul(size) < total_count,
    }
}

/// Compute the window when the total is unknown.
///
/// A full page suggests more rows may follow.
pub fn compute_open_window(page_size: u32, requested_page: u32, returned: usize) -> PageWindow {
    let size = u64::from(page_size);
    let returned = returned as u64;

    PageWindow {
        offset: u64::from(requested_page).saturating_mul(size),
        limit: returned.min(size),
        has_prev: requested_page > 0,
        has_next: size > 0 && returned >= size,
    }
}

/// Number of pages needed for `total` rows.
pub fn total_pages(page_size: u32, total: u64) -> u64 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(u64::from(page_size))
}

/// Paging behaviour of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pager {
    /// Navigable pages of `page_size` rows.
    Paged { page_size: u32, style: PagerStyle },
    /// The first `limit` rows, no navigation.
    Limited { limit: u32 },
    /// Every row, no navigation.
    Unlimited,
}

impl Pager {
    /// Derive the pager of a definition.
    pub fn for_definition(definition: &QueryDefinition) -> Self {
        match (definition.items_per_page, definition.pager.enabled) {
            (0, _) => Pager::Unlimited,
            (page_size, true) => Pager::Paged {
                page_size,
                style: definition.pager.style,
            },
            (limit, false) => Pager::Limited { limit },
        }
    }

    /// Page actually executed. Non-paged displays always run page 0.
    pub fn effective_page(&self, requested: u32) -> u32 {
        match self {
            Pager::Paged { .. } => requested,
            Pager::Limited { .. } | Pager::Unlimited => 0,
        }
    }

    /// Rows the engine should return.
    pub fn fetch_limit(&self) -> Option<u32> {
        match self {
            Pager::Paged { page_size, .. } => Some(*page_size),
            Pager::Limited { limit } => Some(*limit),
            Pager::Unlimited => None,
        }
    }

    /// Whether the engine must count every matching row.
    pub fn counts_total(&self) -> bool {
        !matches!(
            self,
            Pager::Paged {
                style: PagerStyle::Mini,
                ..
            }
        )
    }

    pub fn is_paged(&self) -> bool {
        matches!(self, Pager::Paged { .. })
    }

    /// Window for an execution result. Non-paged displays have none.
    pub fn window(&self, result: &ExecutionResult) -> Option<PageWindow> {
        let Pager::Paged { page_size, .. } = *self else {
            return None;
        };

        Some(match result.total {
            Some(total) => compute_window(page_size, result.page, total),
            None => compute_open_window(page_size, result.page, result.rows.len()),
        })
    }
}

/// Build `prev`/`next` links for a window.
///
/// `params` are the request's raw query pairs; only the page value differs
/// between them and the emitted hrefs.
pub fn pager_links(
    window: Option<&PageWindow>,
    page: u32,
    collection: &str,
    display: &str,
    params: &[(String, String)],
    urls: &dyn UrlBuilder,
) -> LinkSet {
    let mut links = LinkSet::default();
    let Some(window) = window else {
        return links;
    };

    let mut targets = Vec::with_capacity(2);
    if window.has_prev {
        targets.push((PageRelation::Prev, page.saturating_sub(1)));
    }
    if window.has_next {
        targets.push((PageRelation::Next, page.saturating_add(1)));
    }

    for (relation, target) in targets {
        let (key, link) = build_link(
            &LinkKind::Page {
                relation,
                collection,
                display,
                params,
                page: target,
            },
            urls,
        );
        links.insert(key, link);
    }

    links
}

/// Read the requested page from raw query pairs. Missing means page 0;
/// when repeated, the last value wins.
pub fn requested_page(params: &[(String, String)]) -> Result<u32, ValidationError> {
    let Some((_, raw)) = params.iter().rev().find(|(key, _)| key == PAGE_PARAM) else {
        return Ok(0);
    };

    raw.trim()
        .parse()
        .map_err(|_| ValidationError::InvalidValue {
            parameter: PAGE_PARAM.to_string(),
            reason: "must be a non-negative integer".to_string(),
        })
}
