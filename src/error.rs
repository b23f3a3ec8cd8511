//! API-level error taxonomy.
//!
//! Every backend failure is caught at the call site and translated into one
//! of these variants; nothing is allowed to crash a client session. There is
//! no automatic retry — the client must re-trigger the operation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Operation requires an active session and none was presented.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Bad input, caught before any network/storage call.
    #[error("{0}")]
    Validation(String),

    /// Insert/select/update failure against the claim store. Partial side
    /// effects (e.g. a claim row created but not yet imaged) are left in
    /// place, not rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    /// Image render/upload or URL-attach failure. Distinct from
    /// [`ApiError::Persistence`]: the claim row already exists, so the
    /// response carries its id — "saved but image missing", not "nothing
    /// saved".
    #[error("image upload failed for claim {claim_id}: {source}")]
    Upload {
        claim_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// No record matches. For resolution this is a normal result variant,
    /// not a failure; it only reaches here on direct lookups.
    #[error("not found")]
    NotFound,

    /// A single in-flight request per owner is permitted; this one lost.
    #[error("{0}")]
    Busy(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "not authenticated" }),
            ),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Persistence(e) => {
                error!("persistence failure: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "storage failure" }),
                )
            }
            ApiError::Upload { claim_id, source } => {
                error!(claim_id = %claim_id, "image upload failed: {source:#}");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "image upload failed",
                        "claim_id": claim_id,
                        "saved": true,
                    }),
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "not found" })),
            ApiError::Busy(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_names_the_claim() {
        let err = ApiError::Upload {
            claim_id: "c1".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn validation_message_passes_through() {
        let err = ApiError::Validation("account number must not be empty".to_string());
        assert_eq!(err.to_string(), "account number must not be empty");
    }
}
