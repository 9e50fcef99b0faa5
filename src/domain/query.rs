//! Query parameter defaults.
//!
//! Types that need default values after parsing implement `HasDefaults`
//! explicitly; the HTTP extractor calls it for every parsed query.

use serde::Deserialize;

/// Capability to fill unset fields after deserialization.
pub trait HasDefaults {
    fn apply_defaults(&mut self);
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination and ordering parameters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub sort_by: String,
    #[serde(default)]
    pub order: String,
}

impl HasDefaults for ListQuery {
    fn apply_defaults(&mut self) {
        if self.page == 0 {
            self.page = 1;
        }
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self.page_size = self.page_size.min(MAX_PAGE_SIZE);
        if self.sort_by.is_empty() {
            self.sort_by = "created_at".to_string();
        }
        if self.order.is_empty() {
            self.order = "desc".to_string();
        }
    }
}

impl ListQuery {
    /// Zero-based row offset for the current page.
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}
