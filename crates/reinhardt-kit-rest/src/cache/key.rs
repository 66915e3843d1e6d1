//! Cache keys derived from the parts of a request that affect its response.

use crate::error::RestResult;
use http::header::{CACHE_CONTROL, HeaderName, HeaderValue};
use http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The request as seen by the response cache.
#[derive(Debug, Clone, Default)]
pub struct CacheRequest {
	view_id: String,
	args: Vec<String>,
	kwargs: BTreeMap<String, String>,
	query: BTreeMap<String, Vec<String>>,
	media_type: String,
	headers: HeaderMap,
	body: Value,
}

impl CacheRequest {
	/// `view_id` identifies the view method, e.g. `"songs.SongViewSet.list"`.
	pub fn new(view_id: impl Into<String>) -> Self {
		Self {
			view_id: view_id.into(),
			media_type: "application/json".to_string(),
			..Self::default()
		}
	}

	pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.kwargs.insert(name.into(), value.into());
		self
	}

	/// Adds every pair of an urlencoded query string. Repeated names keep all
	/// of their values.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_rest::cache::CacheRequest;
	///
	/// let request = CacheRequest::new("songs.list").with_query_string("tag=a&tag=b&page=2");
	/// assert_eq!(request.query_values("tag"), ["a", "b"]);
	/// ```
	pub fn with_query_string(mut self, query: &str) -> Self {
		for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
			self.query
				.entry(name.into_owned())
				.or_default()
				.push(value.into_owned());
		}
		self
	}

	/// Accepted renderer media type. Defaults to `application/json`.
	pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
		self.media_type = media_type.into();
		self
	}

	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn with_body(mut self, body: Value) -> Self {
		self.body = body;
		self
	}

	pub fn query_values(&self, name: &str) -> &[String] {
		self.query.get(name).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// `Cache-Control` directives, lowercased. `["default"]` when absent.
	pub fn cache_control(&self) -> Vec<String> {
		let raw = self
			.headers
			.get(CACHE_CONTROL)
			.and_then(|value| value.to_str().ok())
			.unwrap_or("default");
		raw.split(',')
			.map(|directive| directive.trim().to_ascii_lowercase())
			.collect()
	}
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
	unique_method_id: &'a str,
	args: &'a [String],
	kwargs: &'a BTreeMap<String, String>,
	all_query_params: &'a BTreeMap<String, Vec<String>>,
	renderer_type: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	body: Option<&'a Value>,
}

/// Hashes the view id, positional and keyword arguments, query parameters and
/// accepted renderer into a cache key; optionally the body as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyConstructor {
	include_body: bool,
}

impl KeyConstructor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Key constructor for views whose response depends on the request body.
	pub fn with_body() -> Self {
		Self { include_body: true }
	}

	pub fn includes_body(&self) -> bool {
		self.include_body
	}

	pub fn key(&self, request: &CacheRequest) -> RestResult<String> {
		let material = KeyMaterial {
			unique_method_id: &request.view_id,
			args: &request.args,
			kwargs: &request.kwargs,
			all_query_params: &request.query,
			renderer_type: &request.media_type,
			body: self.include_body.then_some(&request.body),
		};
		let serialized = serde_json::to_vec(&material)?;
		Ok(hex::encode(Sha256::digest(&serialized)))
	}
}
