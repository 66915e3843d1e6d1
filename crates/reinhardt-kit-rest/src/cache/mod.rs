//! Response caching for list and detail views
//!
//! [`CacheResponse`] wraps a view: the first request renders and stores the
//! response, identical requests are served from the [`Cache`] until the
//! timeout passes. Every response carries `X-Cache: HIT` or `X-Cache: MISS`.
//! A request sending `Cache-Control: no-cache` skips the lookup and refreshes
//! the stored entry.

mod entry;
mod in_memory;
mod key;
mod response;

pub use in_memory::{CacheStatistics, InMemoryCache};
pub use key::{CacheRequest, KeyConstructor};
pub use response::{CacheResponse, CachedResponse};

use crate::error::RestResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage backend for cached values.
#[async_trait]
pub trait Cache: Send + Sync {
	async fn get<T>(&self, key: &str) -> RestResult<Option<T>>
	where
		T: for<'de> Deserialize<'de> + Send;

	/// Stores `value`, expiring after `ttl` when given.
	async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> RestResult<()>
	where
		T: Serialize + Send + Sync;

	async fn delete(&self, key: &str) -> RestResult<()>;

	async fn has_key(&self, key: &str) -> RestResult<bool>;

	async fn clear(&self) -> RestResult<()>;
}
