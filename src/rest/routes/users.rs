// rest/routes/users.rs — Identity routes: register, login, logout, me.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::Session;
use crate::rest::auth::{bearer_token, CurrentUser};
use crate::storage::UserRow;
use crate::AppContext;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

fn user_json(user: &UserRow) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "created_at": user.created_at,
    })
}

fn session_json(session: &Session) -> Value {
    json!({
        "user": user_json(&session.user),
        // shown once; only its digest is stored
        "token": session.token,
    })
}

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let session = ctx.identity.register(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session_json(&session))))
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = ctx.identity.login(&body.email, &body.password).await?;
    Ok(Json(session_json(&session)))
}

pub async fn logout(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;
    ctx.identity.logout(token).await?;
    Ok(Json(json!({ "signed_out": true })))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(user_json(&user))
}
