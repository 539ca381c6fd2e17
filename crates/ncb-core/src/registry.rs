//! Registry port: the authoritative set of registered identifiers.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{domain::Identifier, Error, Result};

/// Hexagonal port for the backing registry.
///
/// Implementations own their timeout/retry policy; the core never retries.
#[async_trait]
pub trait Registry: Send + Sync {
    fn name(&self) -> &'static str;

    /// Snapshot of every registered identifier.
    async fn fetch_all_identifiers(&self) -> Result<HashSet<String>>;

    async fn contains(&self, id: &Identifier) -> Result<bool> {
        Ok(self.fetch_all_identifiers().await?.contains(id.as_str()))
    }

    /// Returns `false` when the identifier was already present.
    async fn insert(&self, id: &Identifier) -> Result<bool>;

    /// Returns `false` when the identifier was not present.
    async fn remove(&self, id: &Identifier) -> Result<bool>;

    async fn count(&self) -> Result<usize> {
        Ok(self.fetch_all_identifiers().await?.len())
    }
}

/// In-process registry, used for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    ids: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: RwLock::new(ids.into_iter().map(Into::into).collect()),
            unavailable: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Simulate an unreachable backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Registry("memory registry marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all_identifiers(&self) -> Result<HashSet<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.ids.read().await.clone())
    }

    async fn contains(&self, id: &Identifier) -> Result<bool> {
        self.check_available()?;
        Ok(self.ids.read().await.contains(id.as_str()))
    }

    async fn insert(&self, id: &Identifier) -> Result<bool> {
        self.check_available()?;
        Ok(self.ids.write().await.insert(id.as_str().to_string()))
    }

    async fn remove(&self, id: &Identifier) -> Result<bool> {
        self.check_available()?;
        Ok(self.ids.write().await.remove(id.as_str()))
    }

    async fn count(&self) -> Result<usize> {
        self.check_available()?;
        Ok(self.ids.read().await.len())
    }
}
