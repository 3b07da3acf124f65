//! Books repository for PostgreSQL

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};

use super::BookRepository;
use crate::{
    error::{AppError, AppResult},
    models::{Book, Category, NewBook, PageRequest, PaginatedResponse},
};

const BOOK_COLUMNS: &str = "b.id, b.code, b.title, b.author, b.editor, b.publisher, b.year, \
                            b.stock, b.cover_image, b.created_at, b.updated_at";

/// Map a unique violation on `books.code` to a duplicate-code error
fn map_insert_error(err: sqlx::Error, code: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateBookCode(code.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// A stock sum beyond INTEGER range is a bad quantity, not a database failure
fn map_stock_error(err: sqlx::Error) -> AppError {
    match &err {
        // numeric_value_out_of_range
        sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
            AppError::Validation("Stock out of range".to_string())
        }
        _ => AppError::Database(err),
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load categories for a batch of books with a single query
    async fn attach_categories(&self, mut books: Vec<Book>) -> AppResult<Vec<Book>> {
        if books.is_empty() {
            return Ok(books);
        }
        let ids: Vec<i64> = books.iter().map(|b| b.id).collect();

        let rows = sqlx::query(
            r#"
            SELECT bc.book_id, c.id, c.code, c.name, c.description, c.created_at
            FROM book_categories bc
            JOIN categories c ON c.id = bc.category_id
            WHERE bc.book_id = ANY($1)
            ORDER BY c.code
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_book: HashMap<i64, Vec<Category>> = HashMap::new();
        for row in rows {
            by_book.entry(row.get("book_id")).or_default().push(Category {
                id: row.get("id"),
                code: row.get("code"),
                name: row.get("name"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            });
        }

        for book in books.iter_mut() {
            book.categories = by_book.remove(&book.id).unwrap_or_default();
        }
        Ok(books)
    }

    async fn attach_one(&self, book: Option<Book>) -> AppResult<Option<Book>> {
        match book {
            Some(book) => Ok(self.attach_categories(vec![book]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn page(
        &self,
        count_query: &str,
        select_query: &str,
        filter: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PaginatedResponse<Book>> {
        let mut count = sqlx::query_scalar::<_, i64>(count_query);
        let mut select = sqlx::query_as::<_, Book>(select_query);
        if let Some(filter) = filter {
            count = count.bind(filter);
            select = select.bind(filter);
        }

        let total = count.fetch_one(&self.pool).await?;
        let books = select
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let books = self.attach_categories(books).await?;
        Ok(PaginatedResponse::new(books, total, page))
    }
}

#[async_trait]
impl BookRepository for BooksRepository {
    async fn find_first_by_code(&self, code: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.code = $1 LIMIT 1",
            BOOK_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        self.attach_one(book).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.attach_one(book).await
    }

    async fn find_by_code_in(&self, codes: &[String]) -> AppResult<Vec<Book>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.code = ANY($1) ORDER BY b.code",
            BOOK_COLUMNS
        ))
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;

        self.attach_categories(books).await
    }

    async fn find_all(&self, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        self.page(
            "SELECT COUNT(*) FROM books",
            &format!(
                "SELECT {} FROM books b ORDER BY b.title ASC, b.id ASC LIMIT $1 OFFSET $2",
                BOOK_COLUMNS
            ),
            None,
            page,
        )
        .await
    }

    async fn search_by_title(&self, query: &str, page: &PageRequest) -> AppResult<PaginatedResponse<Book>> {
        self.page(
            "SELECT COUNT(*) FROM books WHERE STRPOS(LOWER(title), $1) > 0",
            &format!(
                r#"
                SELECT {} FROM books b
                WHERE STRPOS(LOWER(b.title), $1) > 0
                ORDER BY b.title ASC, b.id ASC
                LIMIT $2 OFFSET $3
                "#,
                BOOK_COLUMNS
            ),
            Some(query),
            page,
        )
        .await
    }

    async fn find_by_category_code(
        &self,
        category_code: &str,
        page: &PageRequest,
    ) -> AppResult<PaginatedResponse<Book>> {
        self.page(
            r#"
            SELECT COUNT(*) FROM book_categories bc
            JOIN categories c ON c.id = bc.category_id
            WHERE c.code = $1
            "#,
            &format!(
                r#"
                SELECT {} FROM books b
                JOIN book_categories bc ON bc.book_id = b.id
                JOIN categories c ON c.id = bc.category_id
                WHERE c.code = $1
                ORDER BY b.title ASC, b.id ASC
                LIMIT $2 OFFSET $3
                "#,
                BOOK_COLUMNS
            ),
            Some(category_code),
            page,
        )
        .await
    }

    async fn insert(&self, book: &NewBook, categories: &[Category]) -> AppResult<Book> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (code, title, author, editor, publisher, year, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id, code, title, author, editor, publisher, year, stock, cover_image,
                      created_at, updated_at
            "#,
        )
        .bind(&book.code)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.editor)
        .bind(&book.publisher)
        .bind(book.year)
        .bind(book.stock)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &book.code))?;

        let category_ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
        if !category_ids.is_empty() {
            sqlx::query(
                "INSERT INTO book_categories (book_id, category_id) SELECT $1, UNNEST($2::bigint[])",
            )
            .bind(created.id)
            .bind(&category_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        created.categories = categories.to_vec();
        Ok(created)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut saved = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $2,
                author = $3,
                editor = $4,
                publisher = $5,
                year = $6,
                cover_image = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING id, code, title, author, editor, publisher, year, stock, cover_image,
                      created_at, updated_at
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.editor)
        .bind(&book.publisher)
        .bind(book.year)
        .bind(&book.cover_image)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::BookNotFound(book.code.clone()))?;

        sqlx::query("DELETE FROM book_categories WHERE book_id = $1")
            .bind(book.id)
            .execute(&mut *tx)
            .await?;

        let category_ids: Vec<i64> = book.categories.iter().map(|c| c.id).collect();
        if !category_ids.is_empty() {
            sqlx::query(
                "INSERT INTO book_categories (book_id, category_id) SELECT $1, UNNEST($2::bigint[])",
            )
            .bind(book.id)
            .bind(&category_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        saved.categories = book.categories.clone();
        Ok(saved)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let stock = sqlx::query_scalar::<_, i32>(
            "UPDATE books SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING stock",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stock)
    }

    async fn add_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let stock = sqlx::query_scalar::<_, i32>(
            "UPDATE books SET stock = stock + $2, updated_at = NOW() WHERE id = $1 RETURNING stock",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_stock_error)?;
        Ok(stock)
    }

    async fn subtract_stock(&self, id: i64, quantity: i32) -> AppResult<Option<i32>> {
        let stock = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stock)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct PgError(&'static str);

    impl std::fmt::Display for PgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "SQLSTATE {}", self.0)
        }
    }

    impl std::error::Error for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "integer out of range"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.0 == "23505" {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgError(code)))
    }

    #[test]
    fn test_stock_overflow_is_validation() {
        assert!(matches!(map_stock_error(db_error("22003")), AppError::Validation(_)));
        assert!(matches!(map_stock_error(db_error("40001")), AppError::Database(_)));
        assert!(matches!(map_stock_error(sqlx::Error::RowNotFound), AppError::Database(_)));
    }

    #[test]
    fn test_unique_violation_is_duplicate_code() {
        assert!(matches!(
            map_insert_error(db_error("23505"), "BK1"),
            AppError::DuplicateBookCode(code) if code == "BK1"
        ));
        assert!(matches!(map_insert_error(db_error("22001"), "BK1"), AppError::Database(_)));
    }
}
