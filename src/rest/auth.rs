//! Bearer-token extraction for authenticated routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::storage::UserRow;
use crate::AppContext;

/// Pull the raw token out of an `Authorization: Bearer …` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::NotAuthenticated)
}

/// Extractor: the authenticated user behind the request's bearer token.
/// Rejects with 401 when the header is missing or the token is unknown.
pub struct CurrentUser(pub UserRow);

impl FromRequestParts<Arc<AppContext>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user = ctx.identity.current_user(token).await?;
        Ok(CurrentUser(user))
    }
}
