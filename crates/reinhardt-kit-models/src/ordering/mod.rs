//! Gap-free ordering maintenance
//!
//! Within a grouping, the positions of active members always form the run
//! `0..n`. [`OrderedBehavior`] keeps it that way: creating appends (or inserts
//! at the requested position), repositioning shifts the members in between,
//! and removing a member compacts the rest.
//!
//! ```text
//! [A, B, C, D] at [0, 1, 2, 3]
//!   B.order = 3  ->  A=0, C=1, D=2, B=3
//!   delete C     ->  A=0, D=1, B=2
//! ```

mod assigner;
mod grouping;
mod renumber;

pub use assigner::{Placement, assign_position};
pub use grouping::{Grouping, GroupingResolver};
pub use renumber::renumber;

use crate::behavior::{Behavior, SaveContext, WriteJournal};
use crate::error::ModelResult;
use crate::filters::FilterCondition;
use crate::model::Model;
use crate::soft_delete::SoftDelete;
use crate::store::Store;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A model carrying a position within its grouping.
pub trait Ordered: Model {
	/// Serialized name of the position field.
	fn order_field() -> &'static str {
		"order"
	}

	fn grouping() -> Grouping;

	/// Stored or requested position. `None` before the first save means
	/// "append".
	fn order(&self) -> Option<i64>;

	fn set_order(&mut self, order: i64);
}

/// Keeps positions contiguous on save and delete.
///
/// When combined with soft delete, attach
/// [`SoftDeleteBehavior`](crate::SoftDeleteBehavior) first and build this one
/// with [`OrderedBehavior::with_soft_delete`], so deleted rows leave the
/// sequence.
pub struct OrderedBehavior<M: Ordered> {
	resolver: GroupingResolver<M>,
	is_removed: Option<fn(&M) -> bool>,
}

impl<M: Ordered> OrderedBehavior<M> {
	pub fn new() -> Self {
		Self {
			resolver: GroupingResolver::new(None),
			is_removed: None,
		}
	}

	pub fn resolver(&self) -> &GroupingResolver<M> {
		&self.resolver
	}

	/// Compacts the grouping `instance` belongs to, leaving it out.
	async fn compact(
		&self,
		store: &dyn Store<M>,
		instance: &M,
		journal: Option<&WriteJournal<M>>,
	) -> ModelResult<()> {
		let siblings = self.resolver.siblings(store, instance).await?;
		let entries = Self::entries(&siblings);
		let placement = assign_position(instance.primary_key(), None, &entries, true);
		if let Some(journal) = journal {
			Self::record(journal, &entries, &placement.updates);
		}
		renumber(store, &placement.updates).await
	}

	/// Journals the current position of every sibling about to move.
	fn record(
		journal: &WriteJournal<M>,
		entries: &[(M::PrimaryKey, Option<i64>)],
		updates: &[(M::PrimaryKey, i64)],
	) {
		for (pk, _) in updates {
			let previous = entries
				.iter()
				.find(|(sibling, _)| sibling == pk)
				.and_then(|(_, order)| *order);
			let mut fields = Map::new();
			fields.insert(M::order_field().to_string(), Value::from(previous));
			journal.record(pk.clone(), fields);
		}
	}

	fn entries(siblings: &[M]) -> Vec<(M::PrimaryKey, Option<i64>)> {
		siblings
			.iter()
			.filter_map(|sibling| {
				sibling
					.primary_key()
					.map(|pk| (pk.clone(), sibling.order()))
			})
			.collect()
	}
}

impl<M: Ordered + SoftDelete> OrderedBehavior<M> {
	/// Ordering that treats soft-deleted rows as removed.
	pub fn with_soft_delete() -> Self {
		Self {
			resolver: GroupingResolver::new(Some(FilterCondition::is_null(M::deleted_at_field()))),
			is_removed: Some(|instance: &M| instance.is_deleted()),
		}
	}
}

impl<M: Ordered> Default for OrderedBehavior<M> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<M: Ordered> Behavior<M> for OrderedBehavior<M> {
	fn name(&self) -> &'static str {
		"ordered"
	}

	async fn before_save(&self, instance: &mut M, ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		let removing = self.is_removed.is_some_and(|is_removed| is_removed(&*instance));

		// Moving to another grouping leaves a hole in the previous one
		if !ctx.adding
			&& let Some(pk) = instance.primary_key()
			&& let Some(stored) = ctx.store.get(pk).await?
			&& self.resolver.group_key(&stored)? != self.resolver.group_key(instance)?
		{
			self.compact(ctx.store, &stored, Some(ctx.journal)).await?;
		}

		let siblings = self.resolver.siblings(ctx.store, instance).await?;
		let entries = Self::entries(&siblings);
		let placement =
			assign_position(instance.primary_key(), instance.order(), &entries, removing);
		Self::record(ctx.journal, &entries, &placement.updates);
		renumber(ctx.store, &placement.updates).await?;
		if let Some(position) = placement.position {
			instance.set_order(position);
		}
		Ok(())
	}

	async fn after_delete(&self, instance: &M, store: &dyn Store<M>) -> ModelResult<()> {
		self.compact(store, instance, None).await
	}
}
