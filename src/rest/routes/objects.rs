// rest/routes/objects.rs — serve stored QR images back to clients.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppContext;

/// GET /objects/{owner}/{file} — the read side of the object store's
/// deterministic public URLs.
pub async fn serve_object(
    State(ctx): State<Arc<AppContext>>,
    Path((owner, file)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let path = format!("{owner}/{file}");
    let bytes = ctx
        .objects
        .get(&path)
        .await
        .map_err(ApiError::Persistence)?
        .ok_or(ApiError::NotFound)?;

    let content_type = if file.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
