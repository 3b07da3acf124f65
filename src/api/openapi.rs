//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, categories, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Book catalog, categories, stock and cover images"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::issue_token,
        // Books
        books::list_books,
        books::search_books,
        books::lookup_books,
        books::validate_books,
        books::create_book,
        books::get_book,
        books::update_book,
        books::delete_book,
        books::remove_book_categories,
        books::upload_cover,
        books::borrow_book,
        books::adjust_stock,
        // Categories
        categories::list_categories,
        categories::create_category,
        categories::get_category,
        categories::delete_category,
        categories::list_category_books,
    ),
    components(
        schemas(
            // Auth
            crate::models::credential::TokenRequest,
            crate::models::credential::TokenResponse,
            crate::models::credential::Rights,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBookPayload,
            crate::models::book::UpdateBookPayload,
            crate::models::book::StockAdjustment,
            crate::models::book::BookCodes,
            crate::models::page::BookPage,
            books::CoverUpload,
            // Categories
            crate::models::category::Category,
            crate::models::category::CreateCategoryPayload,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Credential tokens"),
        (name = "books", description = "Book catalog, stock and covers"),
        (name = "categories", description = "Book categories")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by write endpoints
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
