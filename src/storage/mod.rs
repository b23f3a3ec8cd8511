use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

/// The durable claim entity. `id` is assigned by [`Storage::create_claim`]
/// and is the literal string encoded into the QR image — nothing else goes
/// into the payload, so resolution always re-reads this table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: String,
    pub account_number: String,
    pub owner_id: String,
    /// NULL until the rendered image has been uploaded; set exactly once.
    pub image_url: Option<String>,
    pub created_at: String,
}

impl ClaimRow {
    /// A claim without an image is issuance-in-progress (or abandoned),
    /// never complete.
    pub fn is_complete(&self) -> bool {
        self.image_url.is_some()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    /// Argon2id PHC string. Never sent to a client.
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding
    /// it are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("qrclaimd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Claims ─────────────────────────────────────────────────────────────

    /// Insert a claim row with no image and return it. The id is assigned
    /// here, synchronously — it exists before any image does.
    pub async fn create_claim(&self, account_number: &str, owner_id: &str) -> Result<ClaimRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO claims (id, account_number, owner_id, image_url, created_at)
             VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(&id)
        .bind(account_number)
        .bind(owner_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_claim(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("claim not found after insert"))
    }

    /// Exact-match lookup by id. No normalization — a garbage payload simply
    /// matches nothing.
    pub async fn get_claim(&self, id: &str) -> Result<Option<ClaimRow>> {
        Ok(sqlx::query_as("SELECT * FROM claims WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Set the image URL, but only if it is still NULL. Returns `true` if
    /// the row was updated — `false` means the claim was already complete
    /// (the URL is set exactly once) or does not exist.
    pub async fn set_claim_image_url(&self, id: &str, image_url: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE claims SET image_url = ? WHERE id = ? AND image_url IS NULL",
        )
        .bind(image_url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Completed claims for one owner, newest first. Claims still waiting on
    /// an image never appear here.
    pub async fn list_completed_claims(&self, owner_id: &str) -> Result<Vec<ClaimRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM claims
                 WHERE owner_id = ? AND image_url IS NOT NULL
                 ORDER BY created_at DESC",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    /// Count claims left without an image. Reported at startup so abandoned
    /// issuances are visible rather than silently dropped.
    pub async fn count_incomplete_claims(&self) -> Result<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM claims WHERE image_url IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0 as u64)
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_user(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after insert"))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Auth tokens ────────────────────────────────────────────────────────

    /// Store the SHA-256 digest of a bearer token. Raw tokens are never
    /// persisted — they are returned once at register/login.
    pub async fn insert_auth_token(&self, token_hash: &str, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as(
            "SELECT u.* FROM users u
             JOIN auth_tokens t ON t.user_id = u.id
             WHERE t.token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Delete a token (sign-out). Returns `true` if a token was removed.
    pub async fn delete_auth_token(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
