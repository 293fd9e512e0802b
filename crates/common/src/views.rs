//! Derived catalog views.
//!
//! Everything here is pure: it reads a catalog snapshot and returns borrowed
//! subsets. Sorts are unstable, so entries with equal keys come back in no
//! particular order.

use serde::Serialize;
use std::str::FromStr;

use crate::entry::CatalogEntry;

/// Cap for the featured/newest/top shelves on the storefront.
pub const SHELF_LIMIT: usize = 8;

/// Rows per admin table page.
pub const PAGE_SIZE: usize = 10;

/// Entries listed under "recent" on the admin dashboard.
pub const RECENT_LIMIT: usize = 5;

/// Description length shown in admin table rows.
pub const SUMMARY_CHARS: usize = 50;

/// Category sentinel meaning "no filter".
pub const ALL_CATEGORIES: &str = "all";

/// Featured entries in incoming order.
pub fn featured(entries: &[CatalogEntry]) -> Vec<&CatalogEntry> {
    entries
        .iter()
        .filter(|entry| entry.featured)
        .take(SHELF_LIMIT)
        .collect()
}

/// Most recently created entries first.
pub fn newest(entries: &[CatalogEntry]) -> Vec<&CatalogEntry> {
    let mut sorted: Vec<&CatalogEntry> = entries.iter().collect();
    sorted.sort_unstable_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(SHELF_LIMIT);
    sorted
}

/// Most downloaded entries first.
pub fn top_downloaded(entries: &[CatalogEntry]) -> Vec<&CatalogEntry> {
    let mut sorted: Vec<&CatalogEntry> = entries.iter().collect();
    sorted.sort_unstable_by(|a, b| b.downloads.cmp(&a.downloads));
    sorted.truncate(SHELF_LIMIT);
    sorted
}

/// Case-insensitive substring search over name, description and category.
///
/// A blank query returns every entry, unsliced.
pub fn search<'a>(entries: &'a [CatalogEntry], query: &str) -> Vec<&'a CatalogEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }

    entries
        .iter()
        .filter(|entry| {
            entry.name.to_lowercase().contains(&needle)
                || entry.description.to_lowercase().contains(&needle)
                || entry.category.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Category selection; `all` is the "no filter" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => entry.category == *category,
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        if value.is_empty() || value == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(value.to_string())
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CategoryFilter::from(s))
    }
}

/// Entries in exactly the given category.
pub fn by_category<'a>(entries: &'a [CatalogEntry], filter: &CategoryFilter) -> Vec<&'a CatalogEntry> {
    entries.iter().filter(|entry| filter.matches(entry)).collect()
}

/// Admin table filter: case-insensitive match on name or description, then
/// the category filter.
///
/// Unlike the storefront search the query is used as typed (not trimmed) and
/// categories are only matched through `filter`.
pub fn admin_filter<'a>(
    entries: &'a [CatalogEntry],
    query: &str,
    filter: &CategoryFilter,
) -> Vec<&'a CatalogEntry> {
    let needle = query.to_lowercase();

    entries
        .iter()
        .filter(|entry| {
            needle.is_empty()
                || entry.name.to_lowercase().contains(&needle)
                || entry.description.to_lowercase().contains(&needle)
        })
        .filter(|entry| filter.matches(entry))
        .collect()
}

/// One page of a larger listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,

    /// 1-based page number actually served
    pub page: usize,

    pub total_pages: usize,

    /// Size of the full (filtered) listing
    pub total: usize,
}

/// Cursor over a paginated listing.
///
/// The current page always sits in `[1, total_pages]`; navigation outside
/// that range leaves it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    page_size: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of pages for `total` items; an empty listing still has page 1.
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Jump to `page`. Returns false, leaving the cursor alone, when out of range.
    pub fn go_to(&mut self, page: usize, total: usize) -> bool {
        if page < 1 || page > self.total_pages(total) {
            return false;
        }

        self.page = page;
        true
    }

    pub fn next(&mut self, total: usize) -> bool {
        self.go_to(self.page + 1, total)
    }

    pub fn prev(&mut self, total: usize) -> bool {
        self.page > 1 && self.go_to(self.page - 1, total)
    }

    /// Back to page 1, used whenever the filter changes.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Pull the cursor back in range after the listing shrank.
    pub fn clamp(&mut self, total: usize) {
        self.page = self.page.clamp(1, self.total_pages(total));
    }

    /// Items on the current page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = ((self.page - 1) * self.page_size).min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    /// Clamp `requested` into range and cut that page out of `items`.
    pub fn paginate<T: Clone>(&mut self, items: &[T], requested: usize) -> Page<T> {
        self.page = requested;
        self.clamp(items.len());

        Page {
            items: self.slice(items).to_vec(),
            page: self.page,
            total_pages: self.total_pages(items.len()),
            total: items.len(),
        }
    }
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats<'a> {
    pub total_apps: usize,
    pub total_downloads: u64,
    pub average_rating: f64,
    pub recent: Vec<&'a CatalogEntry>,
}

pub fn dashboard(entries: &[CatalogEntry]) -> DashboardStats<'_> {
    let total_downloads = entries
        .iter()
        .fold(0u64, |total, entry| total.saturating_add(entry.downloads));

    let average_rating = if entries.is_empty() {
        0.0
    } else {
        entries.iter().map(|entry| entry.rating).sum::<f64>() / entries.len() as f64
    };

    let mut recent = newest(entries);
    recent.truncate(RECENT_LIMIT);

    DashboardStats {
        total_apps: entries.len(),
        total_downloads,
        average_rating,
        recent,
    }
}
