//! Book model and related request types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::category::Category;

/// Path of the placeholder served for books without a cover, relative to the static prefix
pub const NO_IMAGE_PATH: &str = "/no_image.jpg";

/// Catalog book. `cover_image` holds the stored path relative to the storage root;
/// `cover_image_url` is composed at read time and never persisted.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub author: Option<String>,
    pub editor: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub stock: i32,
    pub cover_image: Option<String>,
    #[sqlx(skip)]
    pub cover_image_url: Option<String>,
    #[sqlx(skip)]
    pub categories: Vec<Category>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn category_codes(&self) -> HashSet<String> {
        self.categories.iter().map(|c| c.code.clone()).collect()
    }
}

/// Book fields for insertion
#[derive(Debug, Clone)]
pub struct NewBook {
    pub code: String,
    pub title: String,
    pub author: Option<String>,
    pub editor: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub stock: i32,
}

impl NewBook {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            author: None,
            editor: None,
            publisher: None,
            year: None,
            stock: default_total_stock(),
        }
    }
}

fn default_total_stock() -> i32 {
    1
}

/// Book and category codes: letters, digits, `-`, `_` and `.`, not starting with a dot.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    let valid = !code.starts_with('.')
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("code")
            .with_message("Code may only contain letters, digits, '-', '_' and '.'".into()))
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookPayload {
    #[validate(length(min = 1, max = 64), custom(function = "validate_code"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(max = 255))]
    pub author: Option<String>,
    #[validate(length(max = 255))]
    pub editor: Option<String>,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
    #[validate(range(min = 0, max = 9999))]
    pub year: Option<i32>,
    /// Initial stock (default: 1)
    #[serde(default = "default_total_stock")]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub total_stock: i32,
    /// Codes of the categories to attach
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub category_code: HashSet<String>,
}

impl CreateBookPayload {
    /// Split into the book fields and the requested category codes
    pub fn into_parts(self) -> (NewBook, HashSet<String>) {
        let book = NewBook {
            code: self.code,
            title: self.title,
            author: self.author,
            editor: self.editor,
            publisher: self.publisher,
            year: self.year,
            stock: self.total_stock,
        };
        (book, self.category_code)
    }
}

/// Update book request. Category associations are replaced by `category_code`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBookPayload {
    #[validate(length(min = 1, max = 255, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(max = 255))]
    pub author: Option<String>,
    #[validate(length(max = 255))]
    pub editor: Option<String>,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
    #[validate(range(min = 0, max = 9999))]
    pub year: Option<i32>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub category_code: HashSet<String>,
}

impl UpdateBookPayload {
    /// Apply descriptive fields onto an existing book, returning the requested category codes
    pub fn apply(self, book: &mut Book) -> HashSet<String> {
        book.title = self.title;
        book.author = self.author;
        book.editor = self.editor;
        book.publisher = self.publisher;
        book.year = self.year;
        self.category_code
    }
}

/// Stock mutation request
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StockAdjustment {
    /// Set the stock to an absolute value
    Set { quantity: i32 },
    Add { quantity: i32 },
    Subtract { quantity: i32 },
}

/// A list of book codes
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookCodes {
    pub codes: Vec<String>,
}
