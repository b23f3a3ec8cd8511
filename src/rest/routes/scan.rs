// rest/routes/scan.rs — Resolver-facing routes.
//
// No authentication: anyone who scans a code must be able to resolve it.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::scan::ScanOutcome;
use crate::AppContext;

pub async fn open_session(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let session_id = ctx.scan_sessions.open().await;
    Json(json!({ "session_id": session_id, "state": "scanning" }))
}

#[derive(Deserialize)]
pub struct ScanRequest {
    /// The exact string decoded from the scanned QR image.
    pub payload: String,
}

pub async fn submit_scan(
    State(ctx): State<Arc<AppContext>>,
    Path(session_id): Path<String>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = ctx.scan_sessions.scan(&session_id, &body.payload).await?;
    let resp = match outcome {
        ScanOutcome::Found(claim) => json!({
            "found": true,
            "state": "resolved",
            "claim": claim,
        }),
        ScanOutcome::NotFound => json!({
            // invalid code — a normal result, the session is re-armed
            "found": false,
            "state": "scanning",
        }),
        ScanOutcome::Latched(result) => json!({
            "latched": true,
            "state": if result.is_some() { "resolved" } else { "resolving" },
            "claim": result,
        }),
    };
    Ok(Json(resp))
}

/// Direct one-shot resolution, outside any scan session. Exact match on the
/// payload; an unknown payload is a plain 404.
pub async fn resolve(
    State(ctx): State<Arc<AppContext>>,
    Path(payload): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let claim = ctx
        .resolver
        .resolve(&payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "claim": claim })))
}

pub async fn dismiss(
    State(ctx): State<Arc<AppContext>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    ctx.scan_sessions.dismiss(&session_id).await?;
    Ok(Json(json!({ "state": "scanning" })))
}
