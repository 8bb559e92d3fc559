use std::collections::HashSet;

use lumen_core::{DeviceKind, DeviceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSortBy {
    CreatedAt,
    UpdatedAt,
    Name,
    SerialNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct QueryOptions<F> {
    pub filter: F,
    pub sort_by: DeviceSortBy,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl Default for QueryOptions<DeviceFilter> {
    /// Newest devices first, no pagination.
    fn default() -> Self {
        Self {
            filter: DeviceFilter::default(),
            sort_by: DeviceSortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            pagination: Pagination {
                offset: 0,
                limit: None,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub statuses: Option<HashSet<DeviceStatus>>,
    pub kinds: Option<HashSet<DeviceKind>>,
    pub active_only: bool,
    pub created_after: Option<jiff::Timestamp>,
    pub created_before: Option<jiff::Timestamp>,
}
