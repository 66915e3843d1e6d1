//! # reinhardt-kit-models
//!
//! Reusable model behaviors for Reinhardt-style applications.
//!
//! A [`Manager`] persists one model type through a [`Store`] and runs the
//! [`Behavior`]s attached to it on every save:
//!
//! - **Ordering**: gap-free positions within a grouping ([`ordering`])
//! - **Soft delete**: `deleted_at` instead of row removal
//! - **Availability**: `starts_at` / `ends_at` windows
//! - **Inheritance**: a `type` discriminator shared by several kinds
//! - **Bound files**: uploads moved next to their record once it exists
//! - **Slugs**: string fields normalized into URL slugs
//!
//! [`Tracked`] adds field-level diffing on top of any model.
//!
//! ## Example
//!
//! ```
//! use reinhardt_kit_models::ordering::{Grouping, Ordered, OrderedBehavior};
//! use reinhardt_kit_models::{InMemoryStore, Manager, Model};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Song { id: Option<i64>, album: String, order: Option<i64> }
//!
//! impl Model for Song {
//!     type PrimaryKey = i64;
//!     fn table_name() -> &'static str { "songs" }
//!     fn model_name() -> &'static str { "Song" }
//!     fn primary_key(&self) -> Option<&i64> { self.id.as_ref() }
//!     fn set_primary_key(&mut self, pk: i64) { self.id = Some(pk); }
//! }
//!
//! impl Ordered for Song {
//!     fn grouping() -> Grouping { Grouping::by(&["album"]) }
//!     fn order(&self) -> Option<i64> { self.order }
//!     fn set_order(&mut self, order: i64) { self.order = Some(order); }
//! }
//!
//! # tokio_test::block_on(async {
//! let songs = Manager::new(Arc::new(InMemoryStore::<Song>::new()))
//!     .with_behavior(OrderedBehavior::new());
//!
//! let intro = songs.create(Song { id: None, album: "A".into(), order: None }).await.unwrap();
//! let opener = songs.create(Song { id: None, album: "A".into(), order: Some(0) }).await.unwrap();
//!
//! assert_eq!(opener.order, Some(0));
//! assert_eq!(songs.get(&intro.id.unwrap()).await.unwrap().order, Some(1));
//! # });
//! ```

pub mod availability;
pub mod behavior;
pub mod diff;
pub mod error;
pub mod files;
pub mod filters;
pub mod inheritance;
pub mod manager;
pub mod model;
pub mod ordering;
pub mod signals;
pub mod slugify;
pub mod soft_delete;
pub mod store;

pub use availability::{Available, AvailabilityChecker, AvailabilityFilters, availability_constraint};
pub use behavior::{Behavior, SaveContext, WriteJournal, WriteMode};
pub use diff::{FieldDiff, Tracked};
pub use error::{IntegrityError, ModelError, ModelResult};
pub use files::{BoundFiles, BoundFilesBehavior, FieldFile, FileStorage, InMemoryFileStorage, StoragePath};
pub use filters::{Filter, FilterCondition, FilterOperator, FilterValue, OrderBy};
pub use inheritance::{Inheritance, InheritanceBehavior, InheritanceFilters};
pub use manager::Manager;
pub use model::{Constraint, Model, Timestamps, as_dict, from_dict};
pub use ordering::{Grouping, Ordered, OrderedBehavior};
pub use signals::{ModelSignals, Signal, SignalError, SignalEvent, SignalName};
pub use slugify::{SlugifyBehavior, slugify};
pub use soft_delete::{SoftDelete, SoftDeleteBehavior};
pub use store::{InMemoryStore, Store};
