//! Data models for the library server

pub mod book;
pub mod category;
pub mod credential;
pub mod page;

// Re-export commonly used types
pub use book::{Book, CreateBookPayload, NewBook, StockAdjustment, UpdateBookPayload};
pub use category::{Category, CreateCategoryPayload};
pub use credential::{Rights, TokenClaims};
pub use page::{PageQuery, PageRequest, PaginatedResponse};
