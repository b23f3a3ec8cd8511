// rest/routes/claims.rs — Issuer-facing routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::claims::ClaimView;
use crate::error::ApiError;
use crate::rest::auth::CurrentUser;
use crate::AppContext;

#[derive(Deserialize)]
pub struct CreateClaimRequest {
    pub account_number: String,
}

/// Issue a claim and produce its image in one call. On an upload failure
/// the claim row survives and the 502 body names its id, so the client can
/// retry via the image endpoint instead of issuing a duplicate.
pub async fn create_claim(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let claim = ctx
        .issuer
        .issue_with_image(&body.account_number, &user.id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "claim": ClaimView::from(claim) })),
    ))
}

/// Retry the render/upload leg for an incomplete claim.
pub async fn attach_image(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Path(claim_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let image_url = ctx.issuer.attach_existing(&claim_id, &user.id).await?;
    Ok(Json(json!({ "claim_id": claim_id, "image_url": image_url })))
}

/// The owner's completed claims, newest first. Claims still waiting on an
/// image are issuance-in-progress and never listed.
pub async fn list_mine(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let claims = ctx
        .storage
        .list_completed_claims(&user.id)
        .await
        .map_err(ApiError::Persistence)?;
    let views: Vec<ClaimView> = claims.into_iter().map(ClaimView::from).collect();
    Ok(Json(json!({ "claims": views })))
}
