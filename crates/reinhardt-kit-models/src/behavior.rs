//! Behavior hooks attached to a manager

use crate::error::ModelResult;
use crate::filters::FilterCondition;
use crate::model::Model;
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Who is asking for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
	/// A user-intended save: behaviors, timestamps and signals all run.
	#[default]
	External,
	/// System maintenance: the row is persisted and nothing else happens.
	Internal,
}

/// State shared with behaviors during one save.
pub struct SaveContext<'a, M: Model> {
	pub store: &'a dyn Store<M>,
	/// The instance has no primary key yet and will be inserted
	pub adding: bool,
	/// The save is part of a soft delete
	pub soft_deleting: bool,
	/// Raw writes to other rows made before the instance itself is written
	pub journal: &'a WriteJournal<M>,
}

/// Previous field values of the rows a save touched besides its own.
///
/// Behaviors record a row here before writing to it directly. When the
/// instance's own write fails, the manager restores the recorded values in
/// reverse order, so a rejected save leaves no trace in other rows.
pub struct WriteJournal<M: Model> {
	entries: Mutex<Vec<(M::PrimaryKey, Map<String, Value>)>>,
}

impl<M: Model> WriteJournal<M> {
	pub fn new() -> Self {
		Self {
			entries: Mutex::new(Vec::new()),
		}
	}

	/// Remembers the values `fields` held on row `pk` before a write.
	pub fn record(&self, pk: M::PrimaryKey, fields: Map<String, Value>) {
		self.entries.lock().push((pk, fields));
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Writes the recorded values back, latest first, and empties the journal.
	///
	/// Every entry is attempted; rows that can no longer be written are
	/// logged and skipped.
	pub async fn rollback(&self, store: &dyn Store<M>) {
		let entries = std::mem::take(&mut *self.entries.lock());
		for (pk, fields) in entries.into_iter().rev() {
			if let Err(error) = store.update_fields(&pk, fields).await {
				tracing::warn!(
					model = M::model_name(),
					pk = %pk,
					%error,
					"failed to restore row after a rejected save"
				);
			}
		}
	}
}

impl<M: Model> Default for WriteJournal<M> {
	fn default() -> Self {
		Self::new()
	}
}

/// A capability hooked into a manager's save and delete pipeline.
///
/// Behaviors run in the order they were attached, so a behavior that depends
/// on another one's state (ordering on soft delete, for instance) must be
/// attached after it.
#[async_trait]
pub trait Behavior<M: Model>: Send + Sync {
	fn name(&self) -> &'static str;

	/// Condition applied to the manager's default querysets.
	fn queryset_filter(&self) -> Option<FilterCondition> {
		None
	}

	async fn before_save(&self, _instance: &mut M, _ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		Ok(())
	}

	async fn after_save(&self, _instance: &mut M, _ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		Ok(())
	}

	/// Runs after the row has been removed from the store.
	async fn after_delete(&self, _instance: &M, _store: &dyn Store<M>) -> ModelResult<()> {
		Ok(())
	}
}
