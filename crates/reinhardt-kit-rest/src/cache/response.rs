use super::key::{CacheRequest, KeyConstructor};
use super::Cache;
use crate::error::{RestError, RestResult};
use crate::settings::KitSettings;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use http::header::{CACHE_CONTROL, EXPIRES, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// A rendered response in storable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
	pub status: u16,
	pub headers: Vec<(String, Vec<u8>)>,
	pub body: Vec<u8>,
}

impl CachedResponse {
	pub fn from_response(response: &Response<Bytes>) -> Self {
		Self {
			status: response.status().as_u16(),
			headers: response
				.headers()
				.iter()
				.map(|(name, value)| (name.to_string(), value.as_bytes().to_vec()))
				.collect(),
			body: response.body().to_vec(),
		}
	}

	/// Rebuilds the response. Headers that no longer parse are dropped.
	pub fn into_response(self) -> RestResult<Response<Bytes>> {
		let status = StatusCode::from_u16(self.status)
			.map_err(|e| RestError::Cache(format!("stored status {}: {}", self.status, e)))?;
		let mut response = Response::new(Bytes::from(self.body));
		*response.status_mut() = status;

		for (name, value) in self.headers {
			if let (Ok(header_name), Ok(header_value)) = (
				name.parse::<HeaderName>(),
				HeaderValue::from_bytes(&value),
			) {
				response.headers_mut().append(header_name, header_value);
			}
		}
		Ok(response)
	}
}

/// Formats `at` as an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn http_date(at: DateTime<Utc>) -> String {
	at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Caches the responses of one view.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use http::Response;
/// use reinhardt_kit_rest::cache::{CacheRequest, CacheResponse, InMemoryCache};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let cached = CacheResponse::new(Arc::new(InMemoryCache::new()));
/// let request = CacheRequest::new("songs.list");
///
/// let first = cached
///     .process(&request, || async { Ok(Response::new(Bytes::from_static(b"[]"))) })
///     .await
///     .unwrap();
/// let second = cached
///     .process(&request, || async { Ok(Response::new(Bytes::from_static(b"[]"))) })
///     .await
///     .unwrap();
///
/// assert_eq!(first.headers()["x-cache"], "MISS");
/// assert_eq!(second.headers()["x-cache"], "HIT");
/// # });
/// ```
pub struct CacheResponse<C: Cache> {
	cache: Arc<C>,
	timeout: Duration,
	cache_errors: bool,
	key_constructor: KeyConstructor,
}

impl<C: Cache> CacheResponse<C> {
	pub fn new(cache: Arc<C>) -> Self {
		Self::from_settings(cache, &KitSettings::default())
	}

	pub fn from_settings(cache: Arc<C>, settings: &KitSettings) -> Self {
		let key_constructor = if settings.body_cache_key {
			KeyConstructor::with_body()
		} else {
			KeyConstructor::new()
		};
		Self {
			cache,
			timeout: Duration::from_secs(settings.cache_timeout),
			cache_errors: settings.cache_errors,
			key_constructor,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Also store responses with status 400 and above.
	pub fn cache_errors(mut self, cache_errors: bool) -> Self {
		self.cache_errors = cache_errors;
		self
	}

	pub fn with_key_constructor(mut self, key_constructor: KeyConstructor) -> Self {
		self.key_constructor = key_constructor;
		self
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Serves `request` from the cache, or renders it with `view` and stores
	/// the result.
	pub async fn process<F, Fut>(&self, request: &CacheRequest, view: F) -> RestResult<Response<Bytes>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RestResult<Response<Bytes>>>,
	{
		let key = self.key_constructor.key(request)?;
		// Other directives (no-store, must-revalidate) are not interpreted
		let no_cache = request
			.cache_control()
			.iter()
			.any(|directive| directive == "no-cache");

		let cached = if no_cache {
			None
		} else {
			self.cache.get::<CachedResponse>(&key).await?
		};

		let (mut response, hit) = match cached {
			Some(cached) => {
				debug!(key = %key, "response cache hit");
				(cached.into_response()?, true)
			}
			None => {
				debug!(key = %key, no_cache, "response cache miss");
				let response = self.render_and_store(&key, no_cache, view).await?;
				(response, false)
			}
		};

		response.headers_mut().insert(
			X_CACHE,
			HeaderValue::from_static(if hit { "HIT" } else { "MISS" }),
		);
		Ok(response)
	}

	async fn render_and_store<F, Fut>(
		&self,
		key: &str,
		no_cache: bool,
		view: F,
	) -> RestResult<Response<Bytes>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RestResult<Response<Bytes>>>,
	{
		let mut response = view().await?;
		if response.status().as_u16() >= 400 && !self.cache_errors {
			return Ok(response);
		}

		let lifetime = TimeDelta::from_std(self.timeout)
			.map_err(|e| RestError::Cache(format!("timeout out of range: {}", e)))?;
		let expires = http_date(Utc::now() + lifetime);
		response.headers_mut().insert(
			EXPIRES,
			HeaderValue::from_str(&expires).map_err(|e| RestError::InvalidHeader(e.to_string()))?,
		);
		if no_cache {
			let max_age = format!("max-age={}", self.timeout.as_secs());
			response.headers_mut().insert(
				CACHE_CONTROL,
				HeaderValue::from_str(&max_age).map_err(|e| RestError::InvalidHeader(e.to_string()))?,
			);
		}

		self.cache
			.set(key, &CachedResponse::from_response(&response), Some(self.timeout))
			.await?;
		Ok(response)
	}
}
