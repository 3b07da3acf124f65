//! Book endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookCodes,
        page::{BookPage, PageRequest},
        Book, CreateBookPayload, PageQuery, PaginatedResponse, StockAdjustment, UpdateBookPayload,
    },
    services::storage::UploadedFile,
};

use super::CredentialToken;

/// Title search parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Text searched for in titles (case-insensitive)
    pub q: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Multipart body of a cover upload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CoverUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// List books sorted by title
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of books", body = BookPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let page = query.page_request()?;
    let books = state.services.books.retrieve_book(&page).await?;
    Ok(Json(books))
}

/// Search books by title
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(SearchQuery),
    responses(
        (status = 200, description = "Page of matching books", body = BookPage)
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let page = PageRequest::new(query.page, query.size)?;
    let books = state.services.books.search_book(&query.q, &page).await?;
    Ok(Json(books))
}

/// Fetch the books matching any of the given codes
#[utoipa::path(
    post,
    path = "/books/lookup",
    tag = "books",
    request_body = BookCodes,
    responses(
        (status = 200, description = "Books found; unknown codes are skipped", body = Vec<Book>)
    )
)]
pub async fn lookup_books(
    State(state): State<crate::AppState>,
    Json(body): Json<BookCodes>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.find_by_codes(&body.codes).await?;
    Ok(Json(books))
}

/// Check that every code matches a book
#[utoipa::path(
    post,
    path = "/books/validate",
    tag = "books",
    request_body = BookCodes,
    responses(
        (status = 200, description = "All codes exist", body = Vec<Book>),
        (status = 404, description = "Unknown codes, comma separated", body = crate::error::ErrorResponse)
    )
)]
pub async fn validate_books(
    State(state): State<crate::AppState>,
    Json(body): Json<BookCodes>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.validate_book(&body.codes).await?;
    Ok(Json(books))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBookPayload,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Book code already exists", body = crate::error::ErrorResponse),
        (status = 422, description = "Unknown category code", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Json(payload): Json<CreateBookPayload>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_write_catalog()?;
    payload.validate()?;

    let (book, category_codes) = payload.into_parts();
    let created = state
        .services
        .books
        .create_new_book(book, &category_codes)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a book by code
#[utoipa::path(
    get,
    path = "/books/{code}",
    tag = "books",
    params(("code" = String, Path, description = "Book code")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_by_code(&code).await?;
    Ok(Json(book))
}

/// Update a book and replace its categories
#[utoipa::path(
    put,
    path = "/books/{code}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    request_body = UpdateBookPayload,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Unknown category code", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
    Json(payload): Json<UpdateBookPayload>,
) -> AppResult<Json<Book>> {
    claims.require_write_catalog()?;
    payload.validate()?;

    let mut book = state.services.books.get_by_code(&code).await?;
    let category_codes = payload.apply(&mut book);
    let updated = state
        .services
        .books
        .update_book(book, &category_codes)
        .await?;
    Ok(Json(updated))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{code}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_write_catalog()?;

    let book = state.services.books.get_by_code(&code).await?;
    state.services.books.destroy_book(book).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Detach all categories from a book
#[utoipa::path(
    delete,
    path = "/books/{code}/categories",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    responses(
        (status = 200, description = "Book without categories", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_book_categories(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
) -> AppResult<Json<Book>> {
    claims.require_write_catalog()?;

    let book = state.services.books.get_by_code(&code).await?;
    let book = state.services.books.remove_all_categories(book).await?;
    Ok(Json(book))
}

/// Upload a cover image (multipart field `file`)
#[utoipa::path(
    post,
    path = "/books/{code}/cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    request_body(content = CoverUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Cover stored", body = Book),
        (status = 400, description = "Missing or invalid file", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_cover(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<Book>> {
    claims.require_write_catalog()?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
        break;
    }

    let file = upload.ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".to_string()))?;
    let book = state.services.books.upload_cover(&code, &file).await?;
    Ok(Json(book))
}

/// Borrow one copy of a book
#[utoipa::path(
    post,
    path = "/books/{code}/borrow",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    responses(
        (status = 200, description = "Stock decremented", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Out of stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
) -> AppResult<Json<Book>> {
    claims.require_write_catalog()?;

    let book = state.services.books.get_by_code(&code).await?;
    let book = state.services.books.borrow_book(book).await?;
    Ok(Json(book))
}

/// Set, add to or subtract from a book's stock
#[utoipa::path(
    patch,
    path = "/books/{code}/stock",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Book code")),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Stock updated", body = Book),
        (status = 400, description = "Invalid quantity", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn adjust_stock(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> AppResult<Json<Book>> {
    claims.require_write_catalog()?;

    let books = &state.services.books;
    let book = books.get_by_code(&code).await?;
    match adjustment {
        StockAdjustment::Set { quantity } => books.update_stock_books(&book, quantity).await?,
        StockAdjustment::Add { quantity } => books.add_stock_by_book_id(book.id, quantity).await?,
        StockAdjustment::Subtract { quantity } => {
            books.subtract_stock_by_book_id(book.id, quantity).await?
        }
    }

    let updated = books
        .find_by_id(book.id)
        .await?
        .ok_or(AppError::BookNotFound(code))?;
    Ok(Json(updated))
}
