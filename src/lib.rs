pub mod claims;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod objectstore;
pub mod qr;
pub mod rest;
pub mod scan;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use claims::issuer::{IssueGate, Issuer};
use claims::resolver::Resolver;
use config::DaemonConfig;
use events::EventBroadcaster;
use identity::Identity;
use objectstore::{FsObjectStore, ObjectStore};
use scan::ScanSessions;
use storage::Storage;

/// Shared application state passed to every REST handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    pub objects: Arc<dyn ObjectStore>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub identity: Arc<Identity>,
    pub issuer: Arc<Issuer>,
    pub resolver: Arc<Resolver>,
    pub scan_sessions: Arc<ScanSessions>,
    pub started_at: std::time::Instant,
}

/// Wire up storage, collaborators, and services from a loaded config.
///
/// Used by `main` and by integration tests, which run the same assembly
/// against a temp data dir.
pub async fn bootstrap(config: Arc<DaemonConfig>) -> Result<Arc<AppContext>> {
    let storage = Arc::new(
        Storage::new_with_slow_query(&config.data_dir, config.slow_query_ms).await?,
    );
    let broadcaster = Arc::new(EventBroadcaster::new());
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
        &config.data_dir,
        &config.public_base_url(),
    ));
    let identity = Arc::new(Identity::new(storage.clone(), broadcaster.clone()));
    let issuer = Arc::new(Issuer::new(
        storage.clone(),
        objects.clone(),
        broadcaster.clone(),
        Arc::new(IssueGate::default()),
    ));
    let resolver = Arc::new(Resolver::new(storage.clone()));
    let scan_sessions = Arc::new(ScanSessions::new(
        resolver.clone(),
        std::time::Duration::from_secs(config.scan_session_ttl_secs),
    ));

    Ok(Arc::new(AppContext {
        config,
        storage,
        objects,
        broadcaster,
        identity,
        issuer,
        resolver,
        scan_sessions,
        started_at: std::time::Instant::now(),
    }))
}
