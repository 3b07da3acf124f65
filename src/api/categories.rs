//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{page::BookPage, Book, Category, CreateCategoryPayload, PageQuery, PaginatedResponse},
};

use super::CredentialToken;

/// List all categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    responses(
        (status = 200, description = "All categories sorted by code", body = Vec<Category>)
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.categories.list().await?;
    Ok(Json(categories))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategoryPayload,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Category code already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Json(payload): Json<CreateCategoryPayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    claims.require_write_catalog()?;

    let category = state.services.categories.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Get a category by code
#[utoipa::path(
    get,
    path = "/categories/{code}",
    tag = "categories",
    params(("code" = String, Path, description = "Category code")),
    responses(
        (status = 200, description = "Category details", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<Category>> {
    let category = state.services.categories.get_by_code(&code).await?;
    Ok(Json(category))
}

/// Delete a category (books lose the association)
#[utoipa::path(
    delete,
    path = "/categories/{code}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Category code")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_category(
    State(state): State<crate::AppState>,
    CredentialToken(claims): CredentialToken,
    Path(code): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_write_catalog()?;

    state.services.categories.delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the books of a category
#[utoipa::path(
    get,
    path = "/categories/{code}/books",
    tag = "categories",
    params(
        ("code" = String, Path, description = "Category code"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Page of books in the category", body = BookPage),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_category_books(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let page = query.page_request()?;
    let category = state.services.categories.get_by_code(&code).await?;
    let books = state
        .services
        .books
        .fetch_book_by_category(&category.code, &page)
        .await?;
    Ok(Json(books))
}
