//! Inheritance by discriminator
//!
//! Several kinds of record share one table and are told apart by a `type`
//! column holding the lowercase model name.

use crate::behavior::{Behavior, SaveContext};
use crate::error::ModelResult;
use crate::filters::FilterCondition;
use crate::model::Model;
use async_trait::async_trait;
use std::marker::PhantomData;

/// A model stored alongside other kinds in a shared table.
pub trait Inheritance: Model {
	fn type_field() -> &'static str {
		"type"
	}

	/// Value stored in the type field. Defaults to the lowercase model name.
	fn discriminator() -> String {
		Self::model_name().to_lowercase()
	}

	fn set_type(&mut self, discriminator: String);
}

/// Stamps the discriminator on every external save.
pub struct InheritanceBehavior<M> {
	_model: PhantomData<fn() -> M>,
}

impl<M: Inheritance> InheritanceBehavior<M> {
	pub fn new() -> Self {
		Self {
			_model: PhantomData,
		}
	}
}

impl<M: Inheritance> Default for InheritanceBehavior<M> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<M: Inheritance> Behavior<M> for InheritanceBehavior<M> {
	fn name(&self) -> &'static str {
		"inheritance"
	}

	async fn before_save(&self, instance: &mut M, _ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		instance.set_type(M::discriminator());
		Ok(())
	}
}

pub struct InheritanceFilters;

impl InheritanceFilters {
	/// Rows of kind `M` only.
	pub fn of_type<M: Inheritance>() -> FilterCondition {
		FilterCondition::eq(M::type_field(), M::discriminator())
	}
}
