//! Page number pagination
//!
//! - [`CustomPagePagination`]: page numbers may start at any value
//!   (`page_start`), and links to the first page omit the page parameter.
//! - [`LightPagePagination`]: the same without counting the collection.
//!   `next` is offered whenever the current page is full.
//!
//! ```text
//! GET /songs/?page=2&page_size=20
//! {"count": 45, "next": "/songs/?page=3&page_size=20", "previous": "/songs/?page_size=20", "results": [...]}
//! ```

mod custom;
mod light;

pub use custom::CustomPagePagination;
pub use light::LightPagePagination;
pub use url::Url;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of a paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
	/// Total number of items. Absent for light pagination.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub count: Option<usize>,
	pub next: Option<String>,
	pub previous: Option<String>,
	pub results: Vec<T>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
	/// Page number as the client addresses it (offset by `page_start`).
	pub number: i64,
	pub results: Vec<T>,
	pub has_next: bool,
	pub has_previous: bool,
	/// Known only when the collection was counted.
	pub count: Option<usize>,
}

/// Last value of query parameter `name`.
pub(crate) fn query_param(url: &Url, name: &str) -> Option<String> {
	url.query_pairs()
		.filter(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.last()
}

/// Returns `url` with `key` set to `value`, other parameters sorted by name.
pub fn replace_query_param(url: &Url, key: &str, value: &str) -> String {
	let mut params = grouped_params(url);
	params.insert(key.to_string(), vec![value.to_string()]);
	with_params(url, &params)
}

/// Returns `url` without `key`, other parameters sorted by name.
pub fn remove_query_param(url: &Url, key: &str) -> String {
	let mut params = grouped_params(url);
	params.remove(key);
	with_params(url, &params)
}

fn grouped_params(url: &Url) -> BTreeMap<String, Vec<String>> {
	let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for (key, value) in url.query_pairs() {
		params
			.entry(key.into_owned())
			.or_default()
			.push(value.into_owned());
	}
	params
}

fn with_params(url: &Url, params: &BTreeMap<String, Vec<String>>) -> String {
	let mut url = url.clone();
	if params.is_empty() {
		url.set_query(None);
	} else {
		let mut serializer = url::form_urlencoded::Serializer::new(String::new());
		for (key, values) in params {
			for value in values {
				serializer.append_pair(key, value);
			}
		}
		url.set_query(Some(&serializer.finish()));
	}
	url.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("http://testserver/songs/?page=2", "http://testserver/songs/?page=3")]
	#[case("http://testserver/songs/", "http://testserver/songs/?page=3")]
	#[case("http://testserver/songs/?z=1&a=2&page=1", "http://testserver/songs/?a=2&page=3&z=1")]
	fn test_replace_query_param(#[case] url: &str, #[case] expected: &str) {
		let url = Url::parse(url).unwrap();
		assert_eq!(replace_query_param(&url, "page", "3"), expected);
	}

	#[rstest]
	#[case("http://testserver/songs/?page=2", "http://testserver/songs/")]
	#[case("http://testserver/songs/?page=2&tag=a&tag=b", "http://testserver/songs/?tag=a&tag=b")]
	fn test_remove_query_param(#[case] url: &str, #[case] expected: &str) {
		let url = Url::parse(url).unwrap();
		assert_eq!(remove_query_param(&url, "page"), expected);
	}

	#[rstest]
	fn test_query_param_takes_last_value() {
		let url = Url::parse("http://testserver/?page=1&page=4").unwrap();
		assert_eq!(query_param(&url, "page").as_deref(), Some("4"));
		assert_eq!(query_param(&url, "missing"), None);
	}
}
