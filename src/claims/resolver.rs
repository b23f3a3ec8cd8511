//! Code Resolver: scanned payload → the one claim it identifies.

use std::sync::Arc;

use crate::claims::ResolvedClaim;
use crate::error::ApiError;
use crate::storage::Storage;

pub struct Resolver {
    storage: Arc<Storage>,
}

impl Resolver {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Look up the claim whose id equals `payload`. Exact match only — no
    /// trimming, no case folding. A pure read: resolution mutates nothing,
    /// and an unknown payload (including scanner garbage) is `Ok(None)`,
    /// never an error.
    pub async fn resolve(&self, payload: &str) -> Result<Option<ResolvedClaim>, ApiError> {
        let claim = self
            .storage
            .get_claim(payload)
            .await
            .map_err(ApiError::Persistence)?;
        Ok(claim.map(ResolvedClaim::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_any_owners_claim_and_misses_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(dir.path()).await.unwrap());
        let claim = storage.create_claim("0712345678", "u1").await.unwrap();
        let resolver = Resolver::new(storage);

        // cross-user by design: no ownership check on the read path
        let hit = resolver.resolve(&claim.id).await.unwrap().unwrap();
        assert_eq!(hit.account_number, "0712345678");
        assert_eq!(hit.created_at, claim.created_at);

        assert!(resolver.resolve("bogus").await.unwrap().is_none());
        // exact match only — a mangled id does not resolve
        let mangled = claim.id.to_uppercase();
        assert!(resolver.resolve(&mangled).await.unwrap().is_none());
    }
}
