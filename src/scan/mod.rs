//! Latching scan sessions.
//!
//! One session tracks one physical scanning surface (a camera view). Once a
//! scan event starts a lookup, the session latches: further events are
//! acknowledged without touching the store, so a code lingering in the
//! camera frame cannot fire redundant lookups. A successful result stays
//! latched until the user dismisses it; a not-found result re-arms the
//! session as soon as it is reported.
//!
//! State machine: `Scanning → Resolving → (Resolved | re-armed Scanning)`;
//! dismiss re-arms. "Idle" is the absence of a session — not yet opened,
//! or already swept after its idle TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::claims::resolver::Resolver;
use crate::claims::ResolvedClaim;
use crate::error::ApiError;

#[derive(Debug, Clone)]
enum ScanState {
    /// Armed: the next scan event starts a lookup.
    Scanning,
    /// A lookup is outstanding. No transition back to Scanning is permitted
    /// until it settles.
    Resolving,
    /// A result is showing; latched until dismissed.
    Resolved(ResolvedClaim),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found(ResolvedClaim),
    /// No claim carries this payload. The session is already re-armed.
    NotFound,
    /// The session was latched (lookup outstanding, or a result already
    /// showing) — no lookup was performed for this event.
    Latched(Option<ResolvedClaim>),
}

struct SessionEntry {
    state: ScanState,
    last_activity: Instant,
}

pub struct ScanSessions {
    resolver: Arc<Resolver>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl ScanSessions {
    pub fn new(resolver: Arc<Resolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Open a new session, armed for scanning. Returns its id.
    pub async fn open(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.lock().await.insert(
            id.clone(),
            SessionEntry {
                state: ScanState::Scanning,
                last_activity: Instant::now(),
            },
        );
        id
    }

    /// Feed one scan event into a session.
    ///
    /// Exactly one lookup runs per armed event; concurrent events observe
    /// `Latched`. Unknown/expired sessions are `NotFound`.
    pub async fn scan(&self, session_id: &str, payload: &str) -> Result<ScanOutcome, ApiError> {
        {
            let mut map = self.sessions.lock().await;
            let entry = map.get_mut(session_id).ok_or(ApiError::NotFound)?;
            entry.last_activity = Instant::now();
            match &entry.state {
                ScanState::Resolving => return Ok(ScanOutcome::Latched(None)),
                ScanState::Resolved(r) => return Ok(ScanOutcome::Latched(Some(r.clone()))),
                ScanState::Scanning => entry.state = ScanState::Resolving,
            }
        }

        // Lookup runs without holding the session map.
        let result = self.resolver.resolve(payload).await;

        let mut map = self.sessions.lock().await;
        // The session may have been swept mid-lookup; the result is still
        // returned to the caller either way.
        match result {
            Ok(Some(claim)) => {
                if let Some(entry) = map.get_mut(session_id) {
                    entry.state = ScanState::Resolved(claim.clone());
                    entry.last_activity = Instant::now();
                }
                Ok(ScanOutcome::Found(claim))
            }
            Ok(None) => {
                // Invalid code: report it and re-arm immediately.
                if let Some(entry) = map.get_mut(session_id) {
                    entry.state = ScanState::Scanning;
                }
                Ok(ScanOutcome::NotFound)
            }
            Err(e) => {
                if let Some(entry) = map.get_mut(session_id) {
                    entry.state = ScanState::Scanning;
                }
                Err(e)
            }
        }
    }

    /// Dismiss a shown result and re-arm the session. Refused while a
    /// lookup is outstanding.
    pub async fn dismiss(&self, session_id: &str) -> Result<(), ApiError> {
        let mut map = self.sessions.lock().await;
        let entry = map.get_mut(session_id).ok_or(ApiError::NotFound)?;
        if matches!(entry.state, ScanState::Resolving) {
            return Err(ApiError::Busy("a lookup is still in progress".to_string()));
        }
        entry.state = ScanState::Scanning;
        entry.last_activity = Instant::now();
        Ok(())
    }

    /// Drop sessions idle longer than the TTL. Returns how many were swept.
    pub async fn sweep(&self) -> usize {
        let mut map = self.sessions.lock().await;
        let before = map.len();
        let ttl = self.ttl;
        map.retain(|_, entry| entry.last_activity.elapsed() < ttl);
        let swept = before - map.len();
        if swept > 0 {
            debug!(swept, "swept idle scan sessions");
        }
        swept
    }

    #[cfg(test)]
    async fn force_resolving(&self, session_id: &str) {
        let mut map = self.sessions.lock().await;
        if let Some(entry) = map.get_mut(session_id) {
            entry.state = ScanState::Resolving;
        }
    }
}
