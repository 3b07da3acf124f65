//! Credential token endpoint

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::credential::{TokenRequest, TokenResponse},
};

/// Exchange client credentials for a bearer token
#[utoipa::path(
    post,
    path = "/auth/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid client credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn issue_token(
    State(state): State<crate::AppState>,
    Json(request): Json<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let response = state.services.auth.issue_token(&request).await?;
    Ok(Json(response))
}
