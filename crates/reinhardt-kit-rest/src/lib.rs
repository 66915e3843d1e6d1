//! # reinhardt-kit-rest
//!
//! REST helpers that sit on top of [`reinhardt_kit_models`]:
//!
//! - [`exceptions`]: storage integrity errors become 409/400 responses with
//!   readable messages
//! - [`cache`]: per-view response caching with `X-Cache` reporting
//! - [`filters`]: query string filters with initial values
//! - [`pagination`]: page numbers with a configurable start, plus a variant
//!   that never counts
//! - [`settings`]: TOML-backed defaults for all of the above

pub mod cache;
pub mod error;
pub mod exceptions;
pub mod filters;
pub mod pagination;
pub mod settings;

pub use cache::{Cache, CacheRequest, CacheResponse, CachedResponse, InMemoryCache, KeyConstructor};
pub use error::{RestError, RestResult};
pub use exceptions::{
	ConflictError, DatabaseEngine, ErrorResponse, ExceptionContext, IntegrityViolation,
	exception_handler,
};
pub use filters::{FilterBackend, FilterSet, QueryFilter, QueryParams};
pub use pagination::{CustomPagePagination, LightPagePagination, Page, PaginatedResponse};
pub use settings::KitSettings;
