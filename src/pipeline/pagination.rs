//! Page-number pagination: `page` and `page-size` query parameters.

use crate::config::PaginationConfig;
use crate::error::AppError;
use serde::Serialize;
use std::collections::HashMap;

pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "page-size";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
}

/// Resolved page: where to read and what to report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u64,
    pub offset: u64,
    pub meta: PageMeta,
}

/// Requested page size, falling back to the default on absent or invalid input and capped at the maximum.
pub fn page_size(params: &HashMap<String, String>, config: &PaginationConfig) -> u64 {
    params
        .get(PAGE_SIZE_PARAM)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(config.max_page_size))
        .unwrap_or(config.page_size)
}

/// Compute the window for `count` matching rows. An unusable page number is not found;
/// page 1 is always valid, even when there are no rows.
pub fn paginate(
    params: &HashMap<String, String>,
    config: &PaginationConfig,
    count: u64,
) -> Result<PageWindow, AppError> {
    let size = page_size(params, config);
    let num_pages = count.div_ceil(size).max(1);
    let page = match params.get(PAGE_PARAM).map(|s| s.trim()) {
        None | Some("") => 1,
        Some("last") => num_pages,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| AppError::NotFound(format!("invalid page '{}'", raw)))?,
    };
    if page > num_pages {
        return Err(AppError::NotFound(format!("invalid page '{}'", page)));
    }
    Ok(PageWindow {
        limit: size,
        offset: (page - 1) * size,
        meta: PageMeta {
            count,
            page,
            page_size: size,
            next: (page < num_pages).then_some(page + 1),
            previous: (page > 1).then(|| page - 1),
        },
    })
}
