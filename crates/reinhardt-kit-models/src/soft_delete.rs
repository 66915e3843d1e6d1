//! Soft deletion
//!
//! A soft-deleted row keeps existing with `deleted_at` set. Default querysets
//! hide it, lookups by primary key still find it, and saving it again through
//! the external pipeline is refused until it is undeleted.

use crate::behavior::{Behavior, SaveContext};
use crate::error::{ModelError, ModelResult};
use crate::filters::FilterCondition;
use crate::model::Model;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;

/// A model that can be soft-deleted.
pub trait SoftDelete: Model {
	fn deleted_at_field() -> &'static str {
		"deleted_at"
	}

	fn deleted_at(&self) -> Option<DateTime<Utc>>;

	fn set_deleted_at(&mut self, deleted_at: Option<DateTime<Utc>>);

	fn is_deleted(&self) -> bool {
		self.deleted_at().is_some()
	}
}

/// Hides deleted rows and guards them against updates.
pub struct SoftDeleteBehavior<M> {
	_model: PhantomData<fn() -> M>,
}

impl<M: SoftDelete> SoftDeleteBehavior<M> {
	pub fn new() -> Self {
		Self {
			_model: PhantomData,
		}
	}

	/// Condition selecting rows that are not deleted.
	pub fn active_filter() -> FilterCondition {
		FilterCondition::is_null(M::deleted_at_field())
	}

	/// Condition selecting deleted rows.
	pub fn deleted_filter() -> FilterCondition {
		FilterCondition::is_not_null(M::deleted_at_field())
	}
}

impl<M: SoftDelete> Default for SoftDeleteBehavior<M> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<M: SoftDelete> Behavior<M> for SoftDeleteBehavior<M> {
	fn name(&self) -> &'static str {
		"soft_delete"
	}

	fn queryset_filter(&self) -> Option<FilterCondition> {
		Some(Self::active_filter())
	}

	async fn before_save(&self, instance: &mut M, ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		if !ctx.adding && !ctx.soft_deleting && instance.is_deleted() {
			return Err(ModelError::UpdatingSoftDeleted);
		}
		Ok(())
	}
}
