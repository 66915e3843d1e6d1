//! # Reinhardt Kit
//!
//! Reusable model behaviors and REST helpers for Reinhardt applications.
//!
//! ## Feature Flags
//!
//! - `full` (default) - Everything below
//! - `models` - [`models`]: gap-free ordering, soft delete, availability
//!   windows, type discriminators, field diffs and bound files
//! - `rest` - [`rest`]: integrity error translation, response caching,
//!   pagination and settings
//!
//! ## Quick Example
//!
//! ```
//! # #[cfg(feature = "rest")]
//! # {
//! use reinhardt_kit::rest::pagination::Url;
//! use reinhardt_kit::rest::{CustomPagePagination, KitSettings};
//!
//! let settings = KitSettings::from_toml_str("page_size = 2").unwrap();
//! let pagination = CustomPagePagination::from_settings(&settings);
//! let url = Url::parse("http://testserver/letters/?page=2").unwrap();
//!
//! let page = pagination.paginate(&["a", "b", "c"], &url).unwrap().unwrap();
//! assert_eq!(page.results, vec!["c"]);
//! # }
//! ```

#[cfg(feature = "models")]
pub use reinhardt_kit_models as models;

#[cfg(feature = "rest")]
pub use reinhardt_kit_rest as rest;

#[cfg(feature = "models")]
pub use reinhardt_kit_models::{Manager, Model, ModelError, ModelResult};

#[cfg(feature = "rest")]
pub use reinhardt_kit_rest::{RestError, RestResult};
