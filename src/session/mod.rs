// Session store module
// Maps opaque session ids to immutable vector indexes, with idle and capacity eviction


use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::index::VectorIndex;
use crate::{RagError, Result};

/// Eviction settings; a zero disables the corresponding limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub idle_ttl_secs: u64,
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
}

impl Default for SessionPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            idle_ttl_secs: 3600,
            max_sessions: 256,
            sweep_interval_secs: 60,
        }
    }
}

/// Opaque random session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[inline]
    #[expect(clippy::new_without_default, reason = "each id must be freshly random")]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = RagError;

    /// Unparseable ids can never name a live session, so they map to `SessionNotFound`
    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| RagError::SessionNotFound(s.to_string()))
    }
}

#[derive(Debug)]
struct SessionEntry {
    index: Arc<VectorIndex>,
    created_at: DateTime<Utc>,
    last_access: Instant,
}

/// Snapshot of a live session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
}

/// Concurrency-safe map of live sessions.
///
/// `create`, `get` and `delete` each hold the lock exactly once, so callers never
/// observe a half-inserted or half-removed session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    idle_ttl: Option<Duration>,
    max_sessions: Option<usize>,
    sweep_interval: Duration,
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl SessionStore {
    #[inline]
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: (policy.idle_ttl_secs > 0).then(|| Duration::from_secs(policy.idle_ttl_secs)),
            max_sessions: (policy.max_sessions > 0).then_some(policy.max_sessions),
            sweep_interval: Duration::from_secs(policy.sweep_interval_secs.max(1)),
        }
    }

    /// Store without any eviction
    #[inline]
    pub fn unbounded() -> Self {
        Self::new(SessionPolicy {
            idle_ttl_secs: 0,
            max_sessions: 0,
            ..SessionPolicy::default()
        })
    }

    #[inline]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    #[inline]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = (max_sessions > 0).then_some(max_sessions);
        self
    }

    #[inline]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.last_access) > ttl)
    }

    /// Store a fully built index under a fresh id
    #[inline]
    pub async fn create(&self, index: VectorIndex) -> SessionId {
        let now = Instant::now();
        let chunk_count = index.len();
        let index = Arc::new(index);
        let mut sessions = self.sessions.write().await;

        if self.idle_ttl.is_some() {
            let before = sessions.len();
            sessions.retain(|_, entry| !self.is_expired(entry, now));
            let expired = before - sessions.len();
            if expired > 0 {
                debug!("Dropped {} expired sessions before create", expired);
            }
        }

        if let Some(max_sessions) = self.max_sessions {
            while sessions.len() >= max_sessions {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access)
                    .map(|(id, _)| *id)
                else {
                    break;
                };
                sessions.remove(&oldest);
                info!(
                    "Evicted least recently used session {} (capacity {})",
                    oldest, max_sessions
                );
            }
        }

        loop {
            let id = SessionId::new();
            if let Entry::Vacant(slot) = sessions.entry(id) {
                slot.insert(SessionEntry {
                    index,
                    created_at: Utc::now(),
                    last_access: now,
                });
                info!("Created session {} with {} chunks", id, chunk_count);
                return id;
            }
        }
    }

    /// Look up a live session, refreshing its idle timer
    #[inline]
    pub async fn get(&self, id: &SessionId) -> Result<Arc<VectorIndex>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let Some(entry) = sessions.get_mut(id) else {
            return Err(RagError::SessionNotFound(id.to_string()));
        };

        if self.is_expired(entry, now) {
            sessions.remove(id);
            info!("Session {} expired", id);
            return Err(RagError::SessionNotFound(id.to_string()));
        }

        entry.last_access = now;
        Ok(Arc::clone(&entry.index))
    }

    #[inline]
    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        let now = Instant::now();
        let removed = self.sessions.write().await.remove(id);

        match removed {
            Some(entry) if !self.is_expired(&entry, now) => {
                info!("Deleted session {}", id);
                Ok(())
            }
            _ => Err(RagError::SessionNotFound(id.to_string())),
        }
    }

    /// Remove every session idle for longer than the TTL, returning how many went
    #[inline]
    pub async fn evict_expired(&self) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let evicted = before - sessions.len();
        drop(sessions);

        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Live sessions, oldest first
    #[inline]
    pub async fn list(&self) -> Vec<SessionInfo> {
        let now = Instant::now();
        let sessions = self.sessions.read().await;

        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry, now))
            .map(|(id, entry)| SessionInfo {
                session_id: *id,
                chunk_count: entry.index.len(),
                created_at: entry.created_at,
                idle_secs: now.saturating_duration_since(entry.last_access).as_secs(),
            })
            .collect();
        drop(sessions);

        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Number of live sessions
    #[inline]
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodically evict idle sessions until the store is dropped.
    ///
    /// Returns `None` when no idle TTL is configured.
    #[inline]
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.idle_ttl.is_none() {
            return None;
        }

        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.sweep_interval;
        debug!("Starting session sweeper every {:?}", period);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Session store dropped, stopping sweeper");
                    break;
                };
                store.evict_expired().await;
            }
        }))
    }
}
