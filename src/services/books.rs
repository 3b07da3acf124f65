//! Book catalog service: creation, category associations, stock and cover images

use std::collections::{BTreeSet, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{book::NO_IMAGE_PATH, Book, Category, NewBook, PageRequest, PaginatedResponse},
    repository::Repository,
};

use super::{
    categories::CategoryService,
    storage::{StorageService, UploadedFile},
};

#[derive(Clone)]
pub struct BookService {
    repository: Repository,
    categories: CategoryService,
    storage: StorageService,
}

impl BookService {
    pub fn new(repository: Repository, categories: CategoryService, storage: StorageService) -> Self {
        Self {
            repository,
            categories,
            storage,
        }
    }

    /// Resolve every code to a category, failing when any of them is unknown
    async fn resolve_categories(&self, codes: &HashSet<String>) -> AppResult<Vec<Category>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let categories = self.categories.find_by_category_codes(codes).await?;
        if categories.len() != codes.len() {
            let found: HashSet<&str> = categories.iter().map(|c| c.code.as_str()).collect();
            let missing: BTreeSet<&str> = codes
                .iter()
                .map(String::as_str)
                .filter(|code| !found.contains(code))
                .collect();
            return Err(AppError::DataIntegrity(format!(
                "Some categories don't exist: {}",
                missing.into_iter().collect::<Vec<_>>().join(",")
            )));
        }
        Ok(categories)
    }

    /// Error for a stock decrement that matched no row
    async fn stock_failure(&self, id: i64, label: &str) -> AppError {
        match self.repository.books.find_by_id(id).await {
            Ok(Some(book)) => {
                AppError::BusinessRule(format!("Not enough stock for book {}", book.code))
            }
            Ok(None) => AppError::BookNotFound(label.to_string()),
            Err(e) => e,
        }
    }

    /// Create a book attached to the given categories
    pub async fn create_new_book(
        &self,
        book: NewBook,
        category_codes: &HashSet<String>,
    ) -> AppResult<Book> {
        let categories = self.resolve_categories(category_codes).await?;

        if let Some(existing) = self.repository.books.find_first_by_code(&book.code).await? {
            return Err(AppError::DuplicateBookCode(existing.code));
        }

        let created = self.repository.books.insert(&book, &categories).await?;
        tracing::info!(code = %created.code, id = created.id, "Book created");
        Ok(self.fill_cover_image(created))
    }

    /// Detach every category from a book
    pub async fn remove_all_categories(&self, mut book: Book) -> AppResult<Book> {
        book.categories.clear();
        let saved = self.repository.books.save(&book).await?;
        Ok(self.fill_cover_image(saved))
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<Book>> {
        let book = self.repository.books.find_first_by_code(code).await?;
        Ok(book.map(|b| self.fill_cover_image(b)))
    }

    /// Like `find_by_code` but a missing book is an error
    pub async fn get_by_code(&self, code: &str) -> AppResult<Book> {
        self.find_by_code(code)
            .await?
            .ok_or_else(|| AppError::BookNotFound(code.to_string()))
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let book = self.repository.books.find_by_id(id).await?;
        Ok(book.map(|b| self.fill_cover_image(b)))
    }

    /// Books matching any of the codes; unknown codes are skipped
    pub async fn find_by_codes(&self, codes: &[String]) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_by_code_in(codes).await?;
        Ok(books.into_iter().map(|b| self.fill_cover_image(b)).collect())
    }

    /// All books, sorted by title
    pub async fn retrieve_book(&self, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        let books = self.repository.books.find_all(page).await?;
        Ok(books.map_items(|b| self.fill_cover_image(b)))
    }

    /// Persist descriptive fields and replace all category associations
    pub async fn update_book(&self, mut book: Book, category_codes: &HashSet<String>) -> AppResult<Book> {
        book.categories = self.resolve_categories(category_codes).await?;
        let updated = self.repository.books.save(&book).await?;
        tracing::info!(code = %updated.code, categories = updated.categories.len(), "Book updated");
        Ok(self.fill_cover_image(updated))
    }

    /// Store a cover image for the book and record its path relative to the storage root
    pub async fn upload_cover(&self, code: &str, file: &UploadedFile) -> AppResult<Book> {
        let mut book = self
            .repository
            .books
            .find_first_by_code(code)
            .await?
            .ok_or_else(|| AppError::BookNotFound(code.to_string()))?;

        let stored = self.storage.store(file, "/", code, true).await?;
        let relative = self.storage.relative_path(&stored)?;

        if let Some(previous) = book.cover_image.replace(relative.clone()) {
            if previous != relative {
                if let Err(e) = self.storage.delete(&previous).await {
                    tracing::warn!("Failed to remove previous cover {}: {}", previous, e);
                }
            }
        }

        let saved = self.repository.books.save(&book).await?;
        tracing::info!(code, cover = %relative, "Cover uploaded");
        Ok(self.fill_cover_image(saved))
    }

    /// Take one copy out of stock
    pub async fn borrow_book(&self, mut book: Book) -> AppResult<Book> {
        match self.repository.books.subtract_stock(book.id, 1).await? {
            Some(stock) => {
                book.stock = stock;
                Ok(self.fill_cover_image(book))
            }
            None => Err(self.stock_failure(book.id, &book.code).await),
        }
    }

    /// Set the stock of a book to `quantity`
    pub async fn update_stock_books(&self, book: &Book, quantity: i32) -> AppResult<()> {
        if quantity < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }
        self.repository
            .books
            .update_stock(book.id, quantity)
            .await?
            .ok_or_else(|| AppError::BookNotFound(book.code.clone()))?;
        Ok(())
    }

    pub async fn add_stock_by_book_id(&self, book_id: i64, quantity: i32) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::Validation("Quantity must be positive".to_string()));
        }
        self.repository
            .books
            .add_stock(book_id, quantity)
            .await?
            .ok_or_else(|| AppError::BookNotFound(format!("id={}", book_id)))?;
        Ok(())
    }

    pub async fn subtract_stock_by_book_id(&self, book_id: i64, quantity: i32) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::Validation("Quantity must be positive".to_string()));
        }
        match self.repository.books.subtract_stock(book_id, quantity).await? {
            Some(_) => Ok(()),
            None => Err(self.stock_failure(book_id, &format!("id={}", book_id)).await),
        }
    }

    /// Delete a book and its stored cover
    pub async fn destroy_book(&self, book: Book) -> AppResult<Book> {
        if !self.repository.books.delete(book.id).await? {
            return Err(AppError::BookNotFound(book.code));
        }
        if let Some(ref cover) = book.cover_image {
            if let Err(e) = self.storage.delete(cover).await {
                tracing::warn!("Failed to remove cover {}: {}", cover, e);
            }
        }
        tracing::info!(code = %book.code, "Book deleted");
        Ok(book)
    }

    /// Set `cover_image_url` from the stored cover path, or the placeholder when there is none
    pub fn fill_cover_image(&self, mut book: Book) -> Book {
        book.cover_image_url = Some(match book.cover_image.as_deref() {
            Some(path) if !path.is_empty() => self.storage.compose_image_url(path),
            _ => self.storage.compose_static_url(NO_IMAGE_PATH),
        });
        book
    }

    /// Case-insensitive search on titles
    pub async fn search_book(&self, query: &str, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        let query = query.trim().to_lowercase();
        let books = self.repository.books.search_by_title(&query, page).await?;
        Ok(books.map_items(|b| self.fill_cover_image(b)))
    }

    /// Resolve all codes, failing with the list of unknown ones
    pub async fn validate_book(&self, codes: &[String]) -> AppResult<Vec<Book>> {
        let books = self.repository.books.find_by_code_in(codes).await?;

        let found: HashSet<&str> = books.iter().map(|b| b.code.as_str()).collect();
        let unknown: BTreeSet<&str> = codes
            .iter()
            .map(String::as_str)
            .filter(|code| !found.contains(code))
            .collect();
        if !unknown.is_empty() {
            let unknown = unknown.into_iter().collect::<Vec<_>>().join(",");
            return Err(AppError::BookNotFound(unknown));
        }

        Ok(books.into_iter().map(|b| self.fill_cover_image(b)).collect())
    }

    pub async fn fetch_book_by_category(
        &self,
        category_code: &str,
        page: &PageRequest,
    ) -> AppResult<PaginatedResponse<Book>> {
        let books = self
            .repository
            .books
            .find_by_category_code(category_code, page)
            .await?;
        Ok(books.map_items(|b| self.fill_cover_image(b)))
    }
}
