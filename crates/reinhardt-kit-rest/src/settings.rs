//! Toolkit settings
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! cache_timeout = 600
//! cache_errors = false
//! body_cache_key = true
//! page_size = 25
//! max_page_size = 100
//! page_start = 0
//! database_engine = "postgresql"
//! ```

use crate::error::{RestError, RestResult};
use crate::exceptions::DatabaseEngine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitSettings {
	/// Seconds a cached response stays fresh.
	pub cache_timeout: u64,

	/// Store responses with status 400 and above as well.
	pub cache_errors: bool,

	/// Hash the request body into response cache keys.
	pub body_cache_key: bool,

	/// Default page size. `None` disables pagination.
	pub page_size: Option<usize>,

	/// Upper bound for a page size requested by the client.
	pub max_page_size: Option<usize>,

	pub page_query_param: String,

	/// Query parameter a client uses to pick the page size. `None` ignores
	/// client requests.
	pub page_size_query_param: Option<String>,

	/// Number of the first page.
	pub page_start: i64,

	/// Wording used when parsing integrity errors.
	pub database_engine: DatabaseEngine,
}

impl Default for KitSettings {
	fn default() -> Self {
		Self {
			cache_timeout: 300,
			cache_errors: false,
			body_cache_key: false,
			page_size: Some(10),
			max_page_size: None,
			page_query_param: "page".to_string(),
			page_size_query_param: Some("page_size".to_string()),
			page_start: 1,
			database_engine: DatabaseEngine::Sqlite,
		}
	}
}

impl KitSettings {
	/// Parse settings from a TOML string.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_rest::KitSettings;
	///
	/// let settings = KitSettings::from_toml_str("page_start = 0").unwrap();
	/// assert_eq!(settings.page_start, 0);
	/// assert_eq!(settings.cache_timeout, 300);
	/// ```
	pub fn from_toml_str(content: &str) -> RestResult<Self> {
		let settings: Self =
			toml::from_str(content).map_err(|e| RestError::Settings(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Rejects values no paginator can work with.
	pub fn validate(&self) -> RestResult<()> {
		if self.page_size == Some(0) {
			return Err(RestError::Settings("page_size must be positive".to_string()));
		}
		if self.max_page_size == Some(0) {
			return Err(RestError::Settings("max_page_size must be positive".to_string()));
		}
		if self.page_query_param.is_empty() {
			return Err(RestError::Settings("page_query_param must not be empty".to_string()));
		}
		Ok(())
	}
}
