//! Bearer-token identity collaborator.
//!
//! The core only needs three things from identity: a current-user lookup to
//! stamp `owner_id` at issuance, owner scoping for listings, and
//! session-change notifications. This module provides exactly that —
//! register/login issue an opaque bearer token, logout revokes it. No
//! refresh tokens, no email verification, no password reset.

use std::sync::Arc;

use anyhow::anyhow;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::events::EventBroadcaster;
use crate::storage::{Storage, UserRow};

/// The outcome of register/login: the user plus the raw bearer token.
/// The token is shown once and never stored — only its digest is.
#[derive(Debug)]
pub struct Session {
    pub user: UserRow,
    pub token: String,
}

pub struct Identity {
    storage: Arc<Storage>,
    broadcaster: Arc<EventBroadcaster>,
}

impl Identity {
    pub fn new(storage: Arc<Storage>, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            storage,
            broadcaster,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("a valid email is required".to_string()));
        }
        if password.len() < 8 {
            return Err(ApiError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }
        if self
            .storage
            .get_user_by_email(&email)
            .await
            .map_err(ApiError::Persistence)?
            .is_some()
        {
            return Err(ApiError::Validation("email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .storage
            .create_user(&email, &password_hash)
            .await
            .map_err(ApiError::Persistence)?;

        info!(user_id = %user.id, "user registered");
        self.open_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let email = email.trim().to_lowercase();
        let user = self
            .storage
            .get_user_by_email(&email)
            .await
            .map_err(ApiError::Persistence)?
            .ok_or(ApiError::NotAuthenticated)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::NotAuthenticated);
        }
        self.open_session(user).await
    }

    /// Revoke the presented token. Idempotent — revoking an unknown token is
    /// still a successful sign-out from the caller's point of view.
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let removed = self
            .storage
            .delete_auth_token(&token_digest(token))
            .await
            .map_err(ApiError::Persistence)?;
        if removed {
            self.broadcaster
                .broadcast("identity.signedOut", json!({}));
        }
        Ok(())
    }

    /// Look up the user behind a bearer token. `NotAuthenticated` when the
    /// token is unknown or revoked.
    pub async fn current_user(&self, token: &str) -> Result<UserRow, ApiError> {
        self.storage
            .get_user_by_token_hash(&token_digest(token))
            .await
            .map_err(ApiError::Persistence)?
            .ok_or(ApiError::NotAuthenticated)
    }

    async fn open_session(&self, user: UserRow) -> Result<Session, ApiError> {
        let token = new_token();
        self.storage
            .insert_auth_token(&token_digest(&token), &user.id)
            .await
            .map_err(ApiError::Persistence)?;
        self.broadcaster
            .broadcast("identity.signedIn", json!({ "user_id": user.id }));
        Ok(Session { user, token })
    }
}

/// Generate a new bearer token (UUID v4, hex without dashes = 32 chars).
fn new_token() -> String {
    Uuid::new_v4().to_string().replace('-', "")
}

/// SHA-256 hex digest — the only form a token is stored in.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Persistence(anyhow!("failed to hash password: {e}")))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| ApiError::Persistence(anyhow!("stored password hash is invalid: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_identity() -> (Identity, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(dir.path()).await.unwrap());
        let broadcaster = Arc::new(EventBroadcaster::new());
        (Identity::new(storage, broadcaster), dir)
    }

    #[test]
    fn token_digest_is_deterministic() {
        let a = token_digest("abc");
        let b = token_digest("abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // 32 bytes × 2 hex chars
        assert_ne!(token_digest("abc"), token_digest("abd"));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[tokio::test]
    async fn register_login_logout_round_trip() {
        let (identity, _dir) = test_identity().await;
        let session = identity.register("User@Example.com", "password1").await.unwrap();
        assert_eq!(session.user.email, "user@example.com");

        let me = identity.current_user(&session.token).await.unwrap();
        assert_eq!(me.id, session.user.id);

        let relogin = identity.login("user@example.com", "password1").await.unwrap();
        assert_ne!(relogin.token, session.token);

        identity.logout(&session.token).await.unwrap();
        assert!(matches!(
            identity.current_user(&session.token).await,
            Err(ApiError::NotAuthenticated)
        ));
        // the second session is unaffected
        assert!(identity.current_user(&relogin.token).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let (identity, _dir) = test_identity().await;
        identity.register("a@b.c", "password1").await.unwrap();
        assert!(matches!(
            identity.register("a@b.c", "password2").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_not_authenticated() {
        let (identity, _dir) = test_identity().await;
        identity.register("a@b.c", "password1").await.unwrap();
        assert!(matches!(
            identity.login("a@b.c", "nope-nope").await,
            Err(ApiError::NotAuthenticated)
        ));
        assert!(matches!(
            identity.login("ghost@b.c", "password1").await,
            Err(ApiError::NotAuthenticated)
        ));
    }
}
