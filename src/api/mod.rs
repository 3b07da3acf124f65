//! API handlers for the library REST endpoints

pub mod auth;
pub mod books;
pub mod categories;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::request::Parts,
    routing::{delete, get, patch, post},
    RequestPartsExt, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{error::AppError, models::TokenClaims, AppState};

/// Extractor for a valid credential token in the `Authorization: Bearer` header
pub struct CredentialToken(pub TokenClaims);

#[async_trait]
impl FromRequestParts<AppState> for CredentialToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing or malformed bearer token".to_string()))?;

        let claims = state.services.auth.verify_token(bearer.token())?;
        Ok(CredentialToken(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let storage = state.config.storage.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/token", post(auth::issue_token))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/search", get(books::search_books))
        .route("/books/lookup", post(books::lookup_books))
        .route("/books/validate", post(books::validate_books))
        .route(
            "/books/:code",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:code/categories", delete(books::remove_book_categories))
        .route(
            "/books/:code/cover",
            post(books::upload_cover).layer(DefaultBodyLimit::max(storage.max_upload_bytes)),
        )
        .route("/books/:code/borrow", post(books::borrow_book))
        .route("/books/:code/stock", patch(books::adjust_stock))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:code",
            get(categories::get_category).delete(categories::delete_category),
        )
        .route("/categories/:code/books", get(categories::list_category_books))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .nest_service(&storage.image_prefix, ServeDir::new(&storage.root_path))
        .nest_service(&storage.static_prefix, ServeDir::new(&storage.static_dir))
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
