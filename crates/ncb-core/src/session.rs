//! Pagination sessions: unmatched results kept for follow-up navigation.
//!
//! - `create` / `get` / `sweep` are the only mutation points
//! - unknown and expired ids are indistinguishable to callers
//! - the map is sharded; each shard has its own lock

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    compare::Summary,
    domain::{Identifier, SessionId, UserId},
};

const DEFAULT_SHARDS: usize = 16;

/// One comparison's unmatched results.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub owner: UserId,
    pub unmatched: Vec<Identifier>,
    pub total: usize,
    pub matched_count: usize,
    pub invalid_count: usize,
    pub page_size: usize,
    pub created_at: Instant,
}

impl Session {
    pub fn total_pages(&self) -> usize {
        self.unmatched.len().div_ceil(self.page_size)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total: self.total,
            matched_count: self.matched_count,
            invalid_count: self.invalid_count,
        }
    }

    fn is_live_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) <= ttl
    }
}

/// Everything `create` needs besides the clock.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub owner: UserId,
    pub unmatched: Vec<Identifier>,
    pub summary: Summary,
    pub page_size: usize,
}

type Shard = RwLock<HashMap<SessionId, Arc<Session>>>;

pub struct SessionStore {
    ttl: Duration,
    shards: Vec<Shard>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_shards(ttl, DEFAULT_SHARDS)
    }

    pub fn with_shards(ttl: Duration, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { ttl, shards }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn shard(&self, id: &SessionId) -> &Shard {
        let mut h = DefaultHasher::new();
        id.hash(&mut h);
        &self.shards[(h.finish() as usize) % self.shards.len()]
    }

    pub async fn create(&self, new: NewSession) -> SessionId {
        self.create_at(new, Instant::now()).await
    }

    pub async fn create_at(&self, new: NewSession, now: Instant) -> SessionId {
        let NewSession {
            owner,
            unmatched,
            summary,
            page_size,
        } = new;

        loop {
            let id = SessionId(Uuid::new_v4().simple().to_string());
            let mut map = self.shard(&id).write().await;
            if map.contains_key(&id) {
                continue;
            }

            let session = Session {
                id: id.clone(),
                owner,
                unmatched,
                total: summary.total,
                matched_count: summary.matched_count,
                invalid_count: summary.invalid_count,
                page_size: page_size.max(1),
                created_at: now,
            };
            tracing::debug!(
                session = %id,
                owner = owner.0,
                items = session.unmatched.len(),
                "session created"
            );
            map.insert(id.clone(), Arc::new(session));
            return id;
        }
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.get_at(id, Instant::now()).await
    }

    /// Expired sessions are evicted on access.
    pub async fn get_at(&self, id: &SessionId, now: Instant) -> Option<Arc<Session>> {
        let shard = self.shard(id);
        {
            let map = shard.read().await;
            match map.get(id) {
                None => return None,
                Some(s) if s.is_live_at(now, self.ttl) => return Some(s.clone()),
                Some(_) => {}
            }
        }

        let mut map = shard.write().await;
        if let Some(s) = map.get(id) {
            if !s.is_live_at(now, self.ttl) {
                map.remove(id);
            }
        }
        None
    }

    /// Remove every expired session. Returns how many were dropped.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut removed = 0usize;
        for shard in &self.shards {
            let mut map = shard.write().await;
            let before = map.len();
            map.retain(|_, s| s.is_live_at(now, self.ttl));
            removed += before - map.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "expired sessions swept");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        let mut n = 0usize;
        for shard in &self.shards {
            n += shard.read().await.len();
        }
        n
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodic background sweep until `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        self.sweep(Instant::now()).await;
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;

    const TTL: Duration = Duration::from_secs(3600);

    fn ids(n: usize) -> Vec<Identifier> {
        let norm = Normalizer::default();
        (0..n)
            .map(|i| norm.normalize(&format!("{}", 1000 + i)).unwrap())
            .collect()
    }

    fn new_session(n: usize) -> NewSession {
        NewSession {
            owner: UserId(7),
            unmatched: ids(n),
            summary: Summary {
                total: n + 1,
                matched_count: 1,
                invalid_count: 0,
            },
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn created_session_is_immediately_reachable() {
        let store = SessionStore::new(TTL);
        let id = store.create(new_session(3)).await;
        let s = store.get(&id).await.unwrap();
        assert_eq!(s.unmatched.len(), 3);
        assert_eq!(s.owner, UserId(7));
        assert_eq!(s.total_pages(), 1);
        assert_eq!(s.summary().unmatched_count(), 3);
    }

    #[tokio::test]
    async fn ids_are_unique_and_opaque() {
        let store = SessionStore::with_shards(TTL, 1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let id = store.create(new_session(1)).await;
            assert_eq!(id.as_str().len(), 32);
            assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(id));
        }
        assert_eq!(store.len().await, 200);
    }

    #[tokio::test]
    async fn expiry_boundary() {
        let store = SessionStore::new(TTL);
        let t0 = Instant::now();
        let id = store.create_at(new_session(2), t0).await;
        let eps = Duration::from_millis(1);

        assert!(store.get_at(&id, t0 + TTL - eps).await.is_some());
        assert!(store.get_at(&id, t0 + TTL).await.is_some());
        assert!(store.get_at(&id, t0 + TTL + eps).await.is_none());
        // Lazy eviction removed it.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_and_expired_look_the_same() {
        let store = SessionStore::new(TTL);
        let t0 = Instant::now();
        let id = store.create_at(new_session(2), t0).await;

        let expired = store.get_at(&id, t0 + TTL * 2).await;
        let unknown = store
            .get_at(&SessionId("deadbeef".to_string()), t0)
            .await;
        assert!(expired.is_none());
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = SessionStore::new(TTL);
        let t0 = Instant::now();
        let old = store.create_at(new_session(1), t0).await;
        let fresh = store
            .create_at(new_session(1), t0 + Duration::from_secs(1800))
            .await;

        let removed = store.sweep(t0 + TTL + Duration::from_secs(1)).await;
        assert_eq!(removed, 1);
        assert!(store.get_at(&old, t0).await.is_none());
        assert!(store
            .get_at(&fresh, t0 + Duration::from_secs(1800))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn page_size_is_never_zero() {
        let store = SessionStore::new(TTL);
        let mut n = new_session(5);
        n.page_size = 0;
        let id = store.create(n).await;
        let s = store.get(&id).await.unwrap();
        assert_eq!(s.page_size, 1);
        assert_eq!(s.total_pages(), 5);
    }

    #[tokio::test]
    async fn concurrent_creates_do_not_collide() {
        let store = Arc::new(SessionStore::new(TTL));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.create(new_session(2)).await }));
        }
        let mut out = std::collections::HashSet::new();
        for h in handles {
            out.insert(h.await.unwrap());
        }
        assert_eq!(out.len(), 32);
        assert_eq!(store.len().await, 32);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let store = Arc::new(SessionStore::new(Duration::from_millis(0)));
        store
            .create_at(new_session(1), Instant::now() - Duration::from_secs(1))
            .await;
        let cancel = CancellationToken::new();
        let handle = store
            .clone()
            .spawn_sweeper(Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty().await);

        cancel.cancel();
        handle.await.unwrap();
    }
}
