//! Query string filters
//!
//! A [`FilterSet`] turns the query parameters of a list request into a
//! [`FilterCondition`] for a manager. Each [`QueryFilter`] reads one parameter;
//! parameters that are absent (or blank) fall back to the filter's initial
//! value, and filters without a usable value leave the queryset alone.
//!
//! ```text
//! GET /campaigns/?status=draft&status=live&featured=1
//!   status   -> status IN ('draft', 'live')
//!   featured -> featured = true
//!   include_unavailable (initial 0) -> starts_at <= now < ends_at
//! ```
//!
//! Values that fail to parse are reported per parameter and surface as a
//! `400 Bad Request` through [`RestError::Validation`].

mod backend;
mod fields;

pub use backend::{FilterBackend, FilterSet};
pub use fields::{AnyOfFilter, IncludeUnavailableFilter, IntBooleanFilter, ValueKind};

use crate::error::RestError;
use reinhardt_kit_models::FilterCondition;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
	#[error("Invalid filter parameter `{param}`: {message}")]
	InvalidParameter { param: String, message: String },
}

pub type FilterResult<T> = Result<T, FilterError>;

impl From<FilterError> for RestError {
	fn from(error: FilterError) -> Self {
		match error {
			FilterError::InvalidParameter { param, message } => {
				let mut errors = Map::new();
				errors.insert(param, Value::from(vec![message]));
				RestError::Validation(Value::Object(errors))
			}
		}
	}
}

/// Query parameters of a request, every value kept in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
	params: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_url(url: &Url) -> Self {
		let mut params = Self::new();
		for (key, value) in url.query_pairs() {
			params.append(key.into_owned(), value.into_owned());
		}
		params
	}

	pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.params.entry(key.into()).or_default().push(value.into());
	}

	/// Replaces every value of `key`.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.params.insert(key.into(), vec![value.into()]);
	}

	pub fn get_all(&self, key: &str) -> &[String] {
		self.params.get(key).map_or(&[], Vec::as_slice)
	}

	/// Last value of `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.get_all(key).last().map(String::as_str)
	}

	/// Whether `key` is missing or its last value is empty.
	pub fn is_blank(&self, key: &str) -> bool {
		self.get(key).is_none_or(str::is_empty)
	}
}

/// One query parameter mapped to a queryset condition.
pub trait QueryFilter: Send + Sync {
	/// Query parameter the filter reads.
	fn param(&self) -> &str;

	/// Value used when the parameter is absent or blank.
	fn initial(&self) -> Option<String> {
		None
	}

	/// Condition for the parameter's values, or `None` to leave the queryset
	/// as it is.
	fn condition(&self, values: &[String]) -> FilterResult<Option<FilterCondition>>;
}
