//! Repository layer for database operations

pub mod books;
pub mod categories;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, Category, CreateCategoryPayload, NewBook, PageRequest, PaginatedResponse},
};

/// Persistence for books and their category associations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_first_by_code(&self, code: &str) -> AppResult<Option<Book>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>>;

    /// Books whose code is in `codes`; unknown codes are skipped
    async fn find_by_code_in(&self, codes: &[String]) -> AppResult<Vec<Book>>;

    /// All books sorted by title
    async fn find_all(&self, page: &PageRequest) -> AppResult<PaginatedResponse<Book>>;

    /// Case-insensitive title search; `query` is expected lowercase
    async fn search_by_title(&self, query: &str, page: &PageRequest) -> AppResult<PaginatedResponse<Book>>;

    async fn find_by_category_code(
        &self,
        category_code: &str,
        page: &PageRequest,
    ) -> AppResult<PaginatedResponse<Book>>;

    /// Insert a book together with its category associations
    async fn insert(&self, book: &NewBook, categories: &[Category]) -> AppResult<Book>;

    /// Persist descriptive fields and the cover path, replacing the category associations
    /// with `book.categories`. Stock only changes through the stock operations.
    async fn save(&self, book: &Book) -> AppResult<Book>;

    /// Returns false when no row was deleted
    async fn delete(&self, id: i64) -> AppResult<bool>;

    /// Set stock; returns the new stock, or None when the book does not exist
    async fn update_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>>;

    /// Atomically add to stock; returns the new stock, or None when the book does not exist
    async fn add_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>>;

    /// Atomically subtract from stock. Returns None when the book does not exist
    /// or its stock is lower than `quantity`.
    async fn subtract_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>>;
}

/// Persistence for categories
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_by_codes(&self, codes: &[String]) -> AppResult<Vec<Category>>;

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Category>>;

    async fn list(&self) -> AppResult<Vec<Category>>;

    async fn create(&self, category: &CreateCategoryPayload) -> AppResult<Category>;

    async fn delete(&self, code: &str) -> AppResult<bool>;
}

/// Main repository struct holding the store implementations
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub categories: Arc<dyn CategoryRepository>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            categories: Arc::new(categories::CategoriesRepository::new(pool)),
        }
    }

    /// Create a repository backed by process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            books: store.clone(),
            categories: store,
        }
    }
}
