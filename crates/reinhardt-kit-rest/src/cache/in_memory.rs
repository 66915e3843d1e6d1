//! In-memory cache implementation

use super::Cache;
use super::entry::CacheEntry;
use crate::error::RestResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Hit and miss counters of an [`InMemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
	pub hits: u64,
	pub misses: u64,
	/// Entries currently stored, expired ones included until cleaned up.
	pub entry_count: u64,
}

/// Process-local cache backend. Clones share the same storage.
#[derive(Clone)]
pub struct InMemoryCache {
	store: Arc<RwLock<HashMap<String, CacheEntry>>>,
	default_ttl: Option<Duration>,
	hits: Arc<AtomicU64>,
	misses: Arc<AtomicU64>,
}

impl InMemoryCache {
	/// Create a new in-memory cache
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_rest::cache::{Cache, InMemoryCache};
	///
	/// # tokio_test::block_on(async {
	/// let cache = InMemoryCache::new();
	/// cache.set("greeting", &"hello", None).await.unwrap();
	///
	/// let value: Option<String> = cache.get("greeting").await.unwrap();
	/// assert_eq!(value.as_deref(), Some("hello"));
	/// # });
	/// ```
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			default_ttl: None,
			hits: Arc::new(AtomicU64::new(0)),
			misses: Arc::new(AtomicU64::new(0)),
		}
	}

	/// TTL applied when `set` is called without one.
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	/// Drops expired entries.
	pub async fn cleanup_expired(&self) {
		let mut store = self.store.write().await;
		store.retain(|_, entry| !entry.is_expired());
	}

	pub async fn statistics(&self) -> CacheStatistics {
		let store = self.store.read().await;
		CacheStatistics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			entry_count: store.len() as u64,
		}
	}
}

impl Default for InMemoryCache {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for InMemoryCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InMemoryCache")
			.field("default_ttl", &self.default_ttl)
			.field("hits", &self.hits.load(Ordering::Relaxed))
			.field("misses", &self.misses.load(Ordering::Relaxed))
			.finish()
	}
}

#[async_trait]
impl Cache for InMemoryCache {
	async fn get<T>(&self, key: &str) -> RestResult<Option<T>>
	where
		T: for<'de> Deserialize<'de> + Send,
	{
		let store = self.store.read().await;

		match store.get(key) {
			Some(entry) if !entry.is_expired() => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				let value = serde_json::from_slice(&entry.value)?;
				Ok(Some(value))
			}
			// Expired entries count as misses
			_ => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				Ok(None)
			}
		}
	}

	async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> RestResult<()>
	where
		T: Serialize + Send + Sync,
	{
		let serialized = serde_json::to_vec(value)?;
		let entry = CacheEntry::new(serialized, ttl.or(self.default_ttl));

		let mut store = self.store.write().await;
		store.insert(key.to_string(), entry);
		Ok(())
	}

	async fn delete(&self, key: &str) -> RestResult<()> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn has_key(&self, key: &str) -> RestResult<bool> {
		let store = self.store.read().await;
		Ok(store.get(key).is_some_and(|entry| !entry.is_expired()))
	}

	async fn clear(&self) -> RestResult<()> {
		let mut store = self.store.write().await;
		store.clear();
		Ok(())
	}
}
