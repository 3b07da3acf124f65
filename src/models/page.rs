//! Pagination types

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::book::Book;
use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: Option<u32>) -> AppResult<Self> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(Self {
            page: page.unwrap_or(0),
            size,
        })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

/// Pagination query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 0
    pub page: Option<u32>,
    /// Items per page (default: 20, max: 100)
    pub size: Option<u32>,
}

impl PageQuery {
    pub fn page_request(&self) -> AppResult<PageRequest> {
        PageRequest::new(self.page, self.size)
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(BookPage = PaginatedResponse<Book>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub items: Vec<T>,
    /// Total number of matching entries
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, request: &PageRequest) -> Self {
        let size = i64::from(request.size);
        let total_pages = (total.max(0) + size - 1) / size;
        Self {
            items,
            total,
            page: request.page,
            size: request.size,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    pub fn map_items<F>(self, f: F) -> Self
    where
        F: FnMut(T) -> T,
    {
        Self {
            items: self.items.into_iter().map(f).collect(),
            ..self
        }
    }
}
