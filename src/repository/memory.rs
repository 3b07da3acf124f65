//! In-process store implementing the repository traits.
//!
//! Enforces the same constraints as the SQL schema.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{BookRepository, CategoryRepository};
use crate::{
    error::{AppError, AppResult},
    models::{Book, Category, CreateCategoryPayload, NewBook, PageRequest, PaginatedResponse},
};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    books: BTreeMap<i64, StoredBook>,
    categories: BTreeMap<i64, Category>,
    last_book_id: i64,
    last_category_id: i64,
}

struct StoredBook {
    book: Book,
    category_ids: BTreeSet<i64>,
}

impl MemoryState {
    fn hydrate(&self, stored: &StoredBook) -> Book {
        let mut book = stored.book.clone();
        book.categories = stored
            .category_ids
            .iter()
            .filter_map(|id| self.categories.get(id).cloned())
            .collect();
        book.categories.sort_by(|a, b| a.code.cmp(&b.code));
        book
    }

    fn find_by_code(&self, code: &str) -> Option<&StoredBook> {
        self.books.values().find(|stored| stored.book.code == code)
    }

    fn category_ids(&self, categories: &[Category]) -> BTreeSet<i64> {
        categories
            .iter()
            .map(|c| c.id)
            .filter(|id| self.categories.contains_key(id))
            .collect()
    }

    fn paginate<'a, I>(&self, books: I, page: &PageRequest) -> PaginatedResponse<Book>
    where
        I: Iterator<Item = &'a StoredBook>,
    {
        let mut matching: Vec<&StoredBook> = books.collect();
        matching.sort_by(|a, b| {
            a.book
                .title
                .cmp(&b.book.title)
                .then(a.book.id.cmp(&b.book.id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .map(|stored| self.hydrate(stored))
            .collect();

        PaginatedResponse::new(items, total, page)
    }

    fn stock_mut(&mut self, id: i64) -> Option<&mut StoredBook> {
        self.books.get_mut(&id)
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn find_first_by_code(&self, code: &str) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.find_by_code(code).map(|stored| state.hydrate(stored)))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.books.get(&id).map(|stored| state.hydrate(stored)))
    }

    async fn find_by_code_in(&self, codes: &[String]) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|stored| codes.contains(&stored.book.code))
            .map(|stored| state.hydrate(stored))
            .collect();
        books.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(books)
    }

    async fn find_all(&self, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        let state = self.state.read().await;
        Ok(state.paginate(state.books.values(), page))
    }

    async fn search_by_title(&self, query: &str, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        let state = self.state.read().await;
        Ok(state.paginate(
            state
                .books
                .values()
                .filter(|stored| stored.book.title.to_lowercase().contains(query)),
            page,
        ))
    }

    async fn find_by_category_code(
        &self,
        category_code: &str,
        page: &PageRequest,
    ) -> AppResult<PaginatedResponse<Book>> {
        let state = self.state.read().await;
        let category_id = state
            .categories
            .values()
            .find(|c| c.code == category_code)
            .map(|c| c.id);

        Ok(state.paginate(
            state.books.values().filter(|stored| {
                category_id.map_or(false, |id| stored.category_ids.contains(&id))
            }),
            page,
        ))
    }

    async fn insert(&self, book: &NewBook, categories: &[Category]) -> AppResult<Book> {
        if book.stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        let mut state = self.state.write().await;
        if state.find_by_code(&book.code).is_some() {
            return Err(AppError::DuplicateBookCode(book.code.clone()));
        }

        state.last_book_id += 1;
        let now = Utc::now();
        let stored = StoredBook {
            book: Book {
                id: state.last_book_id,
                code: book.code.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                editor: book.editor.clone(),
                publisher: book.publisher.clone(),
                year: book.year,
                stock: book.stock,
                cover_image: None,
                cover_image_url: None,
                categories: Vec::new(),
                created_at: now,
                updated_at: now,
            },
            category_ids: state.category_ids(categories),
        };

        let created = state.hydrate(&stored);
        state.books.insert(created.id, stored);
        Ok(created)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let category_ids = state.category_ids(&book.categories);
        let stored = state
            .books
            .get_mut(&book.id)
            .ok_or_else(|| AppError::BookNotFound(book.code.clone()))?;

        stored.book.title = book.title.clone();
        stored.book.author = book.author.clone();
        stored.book.editor = book.editor.clone();
        stored.book.publisher = book.publisher.clone();
        stored.book.year = book.year;
        stored.book.cover_image = book.cover_image.clone();
        stored.book.updated_at = Utc::now();
        stored.category_ids = category_ids;

        let state = &*state;
        Ok(state.hydrate(&state.books[&book.id]))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        Ok(self.state.write().await.books.remove(&id).is_some())
    }

    async fn update_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        if quantity < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }
        let mut state = self.state.write().await;
        Ok(state.stock_mut(id).map(|stored| {
            stored.book.stock = quantity;
            stored.book.updated_at = Utc::now();
            stored.book.stock
        }))
    }

    async fn add_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.stock_mut(id) else {
            return Ok(None);
        };
        let stock = stored
            .book
            .stock
            .checked_add(quantity)
            .filter(|stock| *stock >= 0)
            .ok_or_else(|| AppError::Validation("Stock out of range".to_string()))?;
        stored.book.stock = stock;
        stored.book.updated_at = Utc::now();
        Ok(Some(stock))
    }

    async fn subtract_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let mut state = self.state.write().await;
        Ok(state
            .stock_mut(id)
            .filter(|stored| stored.book.stock >= quantity)
            .map(|stored| {
                stored.book.stock -= quantity;
                stored.book.updated_at = Utc::now();
                stored.book.stock
            }))
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn find_by_codes(&self, codes: &[String]) -> AppResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state
            .categories
            .values()
            .filter(|c| codes.contains(&c.code))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(categories)
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.values().find(|c| c.code == code).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(categories)
    }

    async fn create(&self, category: &CreateCategoryPayload) -> AppResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.code == category.code) {
            return Err(AppError::Conflict(format!(
                "Category with code {} already exists",
                category.code
            )));
        }

        state.last_category_id += 1;
        let created = Category {
            id: state.last_category_id,
            code: category.code.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: Utc::now(),
        };
        state.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete(&self, code: &str) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Some(id) = state.categories.values().find(|c| c.code == code).map(|c| c.id) else {
            return Ok(false);
        };
        state.categories.remove(&id);
        for stored in state.books.values_mut() {
            stored.category_ids.remove(&id);
        }
        Ok(true)
    }
}
