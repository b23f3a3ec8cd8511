//! Code Issuer: creates claims and produces their QR images.
//!
//! Issuance is two steps with distinct failure modes. `issue` creates the
//! durable row (the id exists before any image does). `render_and_attach`
//! renders the QR PNG, uploads it to `{owner_id}/{claim_id}.png`, and sets
//! `image_url` — any failure there leaves a recoverable, incomplete claim
//! behind, never corruption. `attach_existing` is the retry path for such
//! claims.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::events::EventBroadcaster;
use crate::objectstore::ObjectStore;
use crate::qr;
use crate::storage::{ClaimRow, Storage};

/// One in-flight issuance per owner. A concurrent request is rejected, not
/// queued — the client's generate control stays disabled until the call
/// settles, so a second request means a second client, not a retry.
#[derive(Default)]
pub struct IssueGate {
    active: Mutex<HashSet<String>>,
}

impl IssueGate {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // Recover rather than poison-cascade: the set is valid after any panic.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn begin(self: &Arc<Self>, owner_id: &str) -> Result<IssueGuard, ApiError> {
        if !self.lock().insert(owner_id.to_string()) {
            return Err(ApiError::Busy(
                "a QR code is already being generated for this account".to_string(),
            ));
        }
        Ok(IssueGuard {
            gate: Arc::clone(self),
            owner_id: owner_id.to_string(),
        })
    }
}

/// Releases the owner's slot on drop, on success and error paths alike.
pub struct IssueGuard {
    gate: Arc<IssueGate>,
    owner_id: String,
}

impl Drop for IssueGuard {
    fn drop(&mut self) {
        self.gate.lock().remove(&self.owner_id);
    }
}

pub struct Issuer {
    storage: Arc<Storage>,
    objects: Arc<dyn ObjectStore>,
    broadcaster: Arc<EventBroadcaster>,
    gate: Arc<IssueGate>,
}

impl Issuer {
    pub fn new(
        storage: Arc<Storage>,
        objects: Arc<dyn ObjectStore>,
        broadcaster: Arc<EventBroadcaster>,
        gate: Arc<IssueGate>,
    ) -> Self {
        Self {
            storage,
            objects,
            broadcaster,
            gate,
        }
    }

    /// Create one claim row with no image and return it. The returned `id`
    /// is the literal QR payload.
    pub async fn issue(&self, account_number: &str, owner_id: &str) -> Result<ClaimRow, ApiError> {
        let account_number = account_number.trim();
        if account_number.is_empty() {
            return Err(ApiError::Validation(
                "account number must not be empty".to_string(),
            ));
        }
        let claim = self
            .storage
            .create_claim(account_number, owner_id)
            .await
            .map_err(ApiError::Persistence)?;
        info!(claim_id = %claim.id, owner_id, "claim issued");
        Ok(claim)
    }

    /// Full issuance: gate, create the row, render, upload, attach.
    ///
    /// If the render/upload leg fails the error names the claim id — the
    /// row exists and the client must be able to tell "saved but image
    /// missing" apart from "nothing saved".
    pub async fn issue_with_image(
        &self,
        account_number: &str,
        owner_id: &str,
    ) -> Result<ClaimRow, ApiError> {
        let _guard = self.gate.begin(owner_id)?;
        let claim = self.issue(account_number, owner_id).await?;
        let image_url = self.render_and_attach(&claim).await?;
        Ok(ClaimRow {
            image_url: Some(image_url),
            ..claim
        })
    }

    /// Retry the render/attach leg for an incomplete claim. Owner-only; a
    /// foreign or unknown claim id is `NotFound` either way.
    pub async fn attach_existing(
        &self,
        claim_id: &str,
        owner_id: &str,
    ) -> Result<String, ApiError> {
        let claim = self
            .storage
            .get_claim(claim_id)
            .await
            .map_err(ApiError::Persistence)?
            .filter(|c| c.owner_id == owner_id)
            .ok_or(ApiError::NotFound)?;
        if claim.is_complete() {
            return Err(ApiError::Validation(
                "claim already has an image".to_string(),
            ));
        }
        self.render_and_attach(&claim).await
    }

    /// Render the claim's QR PNG (awaiting the render-complete signal),
    /// upload it, and set `image_url` exactly once.
    async fn render_and_attach(&self, claim: &ClaimRow) -> Result<String, ApiError> {
        let upload_err = |source: anyhow::Error| ApiError::Upload {
            claim_id: claim.id.clone(),
            source,
        };

        let png = qr::render_png(claim.id.clone()).await.map_err(upload_err)?;

        let path = format!("{}/{}.png", claim.owner_id, claim.id);
        self.objects
            .put(&path, png, "image/png")
            .await
            .map_err(upload_err)?;
        let image_url = self.objects.public_url(&path);

        let updated = self
            .storage
            .set_claim_image_url(&claim.id, &image_url)
            .await
            .map_err(ApiError::Persistence)?;
        if !updated {
            // Lost a race with another attach; the stored URL stands.
            warn!(claim_id = %claim.id, "image already attached, keeping existing URL");
            return Err(ApiError::Validation(
                "claim already has an image".to_string(),
            ));
        }

        self.broadcaster.broadcast(
            "claim.completed",
            json!({ "claim_id": claim.id, "owner_id": claim.owner_id }),
        );
        info!(claim_id = %claim.id, %image_url, "claim image attached");
        Ok(image_url)
    }
}
