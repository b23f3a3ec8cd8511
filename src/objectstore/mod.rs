//! Object storage collaborator: upload-by-path plus a deterministic
//! public-URL accessor. The Issuer is the only writer; the REST layer reads
//! objects back when serving `/objects/…`.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` (e.g. `"{owner_id}/{claim_id}.png"`),
    /// overwriting any existing object. `content_type` travels with the
    /// object on hosted stores; the filesystem store derives it from the
    /// extension on the way back out.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch an object's bytes, or `None` if nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Deterministic public URL for a given path — valid before and after
    /// the object exists.
    fn public_url(&self, path: &str) -> String;
}

/// Filesystem-backed store under `{data_dir}/objects`, served back over
/// HTTP by this daemon at `{base_url}/objects/{path}`.
pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    pub fn new(data_dir: &Path, base_url: &str) -> Self {
        Self {
            root: data_dir.join("objects"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a relative object path under the store root, rejecting
    /// absolute paths and `..` traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            anyhow::bail!("invalid object path: {path:?}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("failed to write {}", full.display()))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", full.display())),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/objects/{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (FsObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://127.0.0.1:7450/");
        (store, dir)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (store, _dir) = store();
        store
            .put("u1/c1.png", b"fake png".to_vec(), "image/png")
            .await
            .unwrap();
        let bytes = store.get("u1/c1.png").await.unwrap().unwrap();
        assert_eq!(bytes, b"fake png");
        assert!(store.get("u1/missing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let (store, _dir) = store();
        assert!(store
            .put("../escape.png", vec![1], "image/png")
            .await
            .is_err());
        assert!(store.get("/etc/passwd").await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[test]
    fn public_url_is_deterministic_and_slash_trimmed() {
        let (store, _dir) = store();
        assert_eq!(
            store.public_url("u1/c1.png"),
            "http://127.0.0.1:7450/objects/u1/c1.png"
        );
    }
}
