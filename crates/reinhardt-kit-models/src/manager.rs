//! Managers: the save pipeline and querysets of one model type

use crate::availability::{Available, AvailabilityFilters};
use crate::behavior::{Behavior, SaveContext, WriteJournal, WriteMode};
use crate::diff::Tracked;
use crate::error::{ModelError, ModelResult};
use crate::filters::{FilterCondition, FilterValue};
use crate::model::Model;
use crate::ordering::{GroupingResolver, Ordered};
use crate::signals::{ModelSignals, SignalEvent};
use crate::soft_delete::{SoftDelete, SoftDeleteBehavior};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

const SOFT_DELETE: &str = "soft_delete";

/// Entry point for persisting and querying one model type.
///
/// Behaviors run in attachment order on every external save.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::{InMemoryStore, Manager, Model};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Tag { id: Option<i64>, name: String }
///
/// impl Model for Tag {
///     type PrimaryKey = i64;
///     fn table_name() -> &'static str { "tags" }
///     fn model_name() -> &'static str { "Tag" }
///     fn primary_key(&self) -> Option<&i64> { self.id.as_ref() }
///     fn set_primary_key(&mut self, pk: i64) { self.id = Some(pk); }
/// }
///
/// # tokio_test::block_on(async {
/// let tags = Manager::new(Arc::new(InMemoryStore::<Tag>::new()));
/// let tag = tags.create(Tag { id: None, name: "rust".into() }).await.unwrap();
/// assert_eq!(tags.get(&1).await.unwrap().name, tag.name);
/// # });
/// ```
pub struct Manager<M: Model> {
	store: Arc<dyn Store<M>>,
	behaviors: Vec<Arc<dyn Behavior<M>>>,
	signals: ModelSignals<M>,
}

impl<M: Model> Manager<M> {
	pub fn new(store: Arc<dyn Store<M>>) -> Self {
		Self {
			store,
			behaviors: Vec::new(),
			signals: ModelSignals::new(),
		}
	}

	/// Attaches a behavior after the ones already attached.
	pub fn with_behavior(mut self, behavior: impl Behavior<M> + 'static) -> Self {
		self.behaviors.push(Arc::new(behavior));
		self
	}

	pub fn signals(&self) -> &ModelSignals<M> {
		&self.signals
	}

	pub fn store(&self) -> &dyn Store<M> {
		self.store.as_ref()
	}

	/// Names of the attached behaviors, in execution order.
	pub fn behavior_names(&self) -> Vec<&'static str> {
		self.behaviors.iter().map(|b| b.name()).collect()
	}

	fn has_behavior(&self, name: &str) -> bool {
		self.behaviors.iter().any(|b| b.name() == name)
	}

	/// The behaviors' queryset conditions, optionally skipping one behavior.
	fn default_filter(&self, skip: Option<&str>) -> FilterCondition {
		FilterCondition::and(
			self.behaviors
				.iter()
				.filter(|b| Some(b.name()) != skip)
				.filter_map(|b| b.queryset_filter())
				.collect(),
		)
	}

	pub async fn create(&self, mut instance: M) -> ModelResult<M> {
		self.save(&mut instance).await?;
		Ok(instance)
	}

	pub async fn save(&self, instance: &mut M) -> ModelResult<()> {
		self.save_with(instance, WriteMode::External).await
	}

	pub async fn save_with(&self, instance: &mut M, mode: WriteMode) -> ModelResult<()> {
		match mode {
			WriteMode::External => self.run_pipeline(instance, false).await,
			WriteMode::Internal => self.write(instance).await.map(|_| ()),
		}
	}

	/// Saves and resets the change snapshot.
	pub async fn save_tracked(&self, tracked: &mut Tracked<M>) -> ModelResult<()> {
		self.save(tracked).await?;
		tracked.mark_saved()
	}

	async fn run_pipeline(&self, instance: &mut M, soft_deleting: bool) -> ModelResult<()> {
		let adding = instance.primary_key().is_none();
		let journal = WriteJournal::new();
		let ctx = SaveContext {
			store: self.store.as_ref(),
			adding,
			soft_deleting,
			journal: &journal,
		};

		let original = instance.clone();
		let created = match self.prepare_and_write(instance, &ctx).await {
			Ok(created) => created,
			Err(error) => {
				if !journal.is_empty() {
					tracing::debug!(
						model = M::model_name(),
						rows = journal.len(),
						%error,
						"save rejected, restoring rows written before it"
					);
					journal.rollback(self.store.as_ref()).await;
				}
				*instance = original;
				return Err(error);
			}
		};

		self.signals
			.post_save
			.send(SignalEvent {
				instance: instance.clone(),
				created,
			})
			.await?;
		for behavior in &self.behaviors {
			behavior.after_save(instance, &ctx).await?;
		}
		Ok(())
	}

	/// Everything up to and including the instance's own write.
	async fn prepare_and_write(&self, instance: &mut M, ctx: &SaveContext<'_, M>) -> ModelResult<bool> {
		for behavior in &self.behaviors {
			behavior.before_save(instance, ctx).await?;
		}
		if let Some(timestamps) = instance.timestamps_mut() {
			timestamps.touch(Utc::now());
		}
		self.signals
			.pre_save
			.send(SignalEvent {
				instance: instance.clone(),
				created: ctx.adding,
			})
			.await?;

		self.write(instance).await
	}

	/// Inserts or updates; returns whether a row was inserted.
	async fn write(&self, instance: &mut M) -> ModelResult<bool> {
		if instance.primary_key().is_some() {
			self.store.update(instance).await?;
			Ok(false)
		} else {
			*instance = self.store.insert(instance.clone()).await?;
			Ok(true)
		}
	}

	/// Looks a row up by primary key, whatever the default filters say.
	pub async fn get(&self, pk: &M::PrimaryKey) -> ModelResult<M> {
		self.store
			.get(pk)
			.await?
			.ok_or_else(|| ModelError::not_found::<M>(pk))
	}

	/// Reloads `instance` from the store.
	pub async fn refresh(&self, instance: &mut M) -> ModelResult<()> {
		let pk = instance.primary_key().cloned().ok_or_else(|| {
			ModelError::InvalidRecord("cannot refresh an unsaved instance".to_string())
		})?;
		*instance = self.get(&pk).await?;
		Ok(())
	}

	pub async fn all(&self) -> ModelResult<Vec<M>> {
		self.filter(FilterCondition::everything()).await
	}

	pub async fn filter(&self, condition: FilterCondition) -> ModelResult<Vec<M>> {
		let condition = self.default_filter(None) & condition;
		self.store.filter(&condition, &M::ordering()).await
	}

	pub async fn first(&self, condition: FilterCondition) -> ModelResult<Option<M>> {
		Ok(self.filter(condition).await?.into_iter().next())
	}

	pub async fn count(&self, condition: FilterCondition) -> ModelResult<usize> {
		let condition = self.default_filter(None) & condition;
		self.store.count(&condition).await
	}

	/// Removes the row for good.
	///
	/// Emits `pre_delete`/`post_delete` and lets behaviors react (ordering
	/// compacts the grouping). Returns `false` when the row did not exist.
	pub async fn delete(&self, instance: &M) -> ModelResult<bool> {
		let Some(pk) = instance.primary_key() else {
			return Ok(false);
		};
		let event = SignalEvent {
			instance: instance.clone(),
			created: false,
		};
		self.signals.pre_delete.send(event.clone()).await?;
		let deleted = self.store.delete(pk).await?;
		if deleted {
			self.signals.post_delete.send(event).await?;
			for behavior in &self.behaviors {
				behavior.after_delete(instance, self.store.as_ref()).await?;
			}
		}
		Ok(deleted)
	}

	/// Bulk field write on the default queryset. No behaviors, no signals.
	pub async fn update_where(
		&self,
		condition: FilterCondition,
		fields: Map<String, Value>,
	) -> ModelResult<usize> {
		let condition = self.default_filter(None) & condition;
		self.store.update_where(&condition, fields).await
	}

	fn pk_condition(pk: &M::PrimaryKey) -> ModelResult<FilterCondition> {
		let pk = FilterValue::from_json(&serde_json::to_value(pk)?);
		Ok(FilterCondition::eq(M::primary_key_field(), pk))
	}
}

impl<M: Ordered> Manager<M> {
	fn grouping_resolver(&self) -> GroupingResolver<M> {
		let active = self.default_filter(None);
		GroupingResolver::new(Some(active))
	}

	/// Active members of `instance`'s grouping, itself excluded, by position.
	pub async fn siblings(&self, instance: &M) -> ModelResult<Vec<M>> {
		self.grouping_resolver()
			.siblings(self.store.as_ref(), instance)
			.await
	}

	/// The member right before `instance`.
	pub async fn previous(&self, instance: &M) -> ModelResult<Option<M>> {
		let Some(order) = instance.order() else {
			return Ok(None);
		};
		Ok(self
			.siblings(instance)
			.await?
			.into_iter()
			.find(|sibling| sibling.order() == Some(order - 1)))
	}

	/// The member right after `instance`.
	pub async fn next(&self, instance: &M) -> ModelResult<Option<M>> {
		let Some(order) = instance.order() else {
			return Ok(None);
		};
		Ok(self
			.siblings(instance)
			.await?
			.into_iter()
			.find(|sibling| sibling.order() == Some(order + 1)))
	}

	/// Requests `position` for `instance` and saves it.
	///
	/// The position is clamped into the grouping, so the stored value may
	/// differ from the request.
	pub async fn move_to(&self, instance: &mut M, position: i64) -> ModelResult<()> {
		instance.set_order(position);
		self.save(instance).await
	}
}

impl<M: SoftDelete> Manager<M> {
	/// Marks `instance` deleted. Already deleted instances are left alone.
	pub async fn soft_delete(&self, instance: &mut M) -> ModelResult<()> {
		if instance.is_deleted() {
			return Ok(());
		}
		self.signals
			.pre_soft_delete
			.send(SignalEvent {
				instance: instance.clone(),
				created: false,
			})
			.await?;

		instance.set_deleted_at(Some(Utc::now()));
		self.run_pipeline(instance, true).await?;

		self.signals
			.post_soft_delete
			.send(SignalEvent {
				instance: instance.clone(),
				created: false,
			})
			.await?;
		Ok(())
	}

	/// Brings a soft-deleted instance back. No-op when it is not deleted.
	pub async fn undelete(&self, instance: &mut M) -> ModelResult<()> {
		if !instance.is_deleted() {
			return Ok(());
		}
		self.signals
			.pre_undelete
			.send(SignalEvent {
				instance: instance.clone(),
				created: false,
			})
			.await?;

		instance.set_deleted_at(None);
		self.save(instance).await?;

		self.signals
			.post_undelete
			.send(SignalEvent {
				instance: instance.clone(),
				created: false,
			})
			.await?;
		Ok(())
	}

	pub async fn all_with_deleted(&self) -> ModelResult<Vec<M>> {
		self.filter_with_deleted(FilterCondition::everything())
			.await
	}

	pub async fn filter_with_deleted(&self, condition: FilterCondition) -> ModelResult<Vec<M>> {
		let condition = self.default_filter(Some(SOFT_DELETE)) & condition;
		self.store.filter(&condition, &M::ordering()).await
	}

	/// Deleted rows only.
	pub async fn deleted(&self) -> ModelResult<Vec<M>> {
		self.filter_with_deleted(SoftDeleteBehavior::<M>::deleted_filter())
			.await
	}

	/// Removes the row for good, deleted or not.
	pub async fn hard_delete(&self, instance: &M) -> ModelResult<bool> {
		self.delete(instance).await
	}

	/// Soft-deletes every active match one by one, with signals.
	///
	/// Returns `(false, 0)` when nothing matched.
	pub async fn soft_delete_where(&self, condition: FilterCondition) -> ModelResult<(bool, usize)> {
		let matches = self.filter(condition).await?;
		if matches.is_empty() {
			return Ok((false, 0));
		}
		let mut deleted = 0;
		for mut instance in matches {
			// Earlier deletions may have renumbered this row
			self.refresh(&mut instance).await?;
			self.soft_delete(&mut instance).await?;
			deleted += 1;
		}
		Ok((true, deleted))
	}

	/// Clears `deleted_at` on matching rows with one bulk write.
	///
	/// Like any bulk write this skips behaviors and signals.
	pub async fn undelete_where(&self, condition: FilterCondition) -> ModelResult<usize> {
		let condition = self.default_filter(Some(SOFT_DELETE))
			& SoftDeleteBehavior::<M>::deleted_filter()
			& condition;
		let mut fields = Map::new();
		fields.insert(M::deleted_at_field().to_string(), Value::Null);
		self.store.update_where(&condition, fields).await
	}

	/// Removes every match for good, deleted rows included.
	pub async fn hard_delete_where(&self, condition: FilterCondition) -> ModelResult<usize> {
		let matches = self.filter_with_deleted(condition).await?;
		let mut deleted = 0;
		for instance in matches {
			if self.delete(&instance).await? {
				deleted += 1;
			}
		}
		Ok(deleted)
	}

	/// Whether soft deletion is active on this manager.
	pub fn soft_delete_enabled(&self) -> bool {
		self.has_behavior(SOFT_DELETE)
	}
}

impl<M: Available> Manager<M> {
	pub async fn current(&self, at: Option<DateTime<Utc>>) -> ModelResult<Vec<M>> {
		self.filter(AvailabilityFilters::current(at.unwrap_or_else(Utc::now)))
			.await
	}

	pub async fn past(&self, at: Option<DateTime<Utc>>) -> ModelResult<Vec<M>> {
		self.filter(AvailabilityFilters::past(at.unwrap_or_else(Utc::now)))
			.await
	}

	pub async fn future(&self, at: Option<DateTime<Utc>>) -> ModelResult<Vec<M>> {
		self.filter(AvailabilityFilters::future(at.unwrap_or_else(Utc::now)))
			.await
	}

	/// Rows whose window overlaps `instance`'s, itself excluded.
	pub async fn same_availability_of(&self, instance: &M) -> ModelResult<Vec<M>> {
		let mut condition =
			AvailabilityFilters::same_availability(instance.starts_at(), instance.ends_at());
		if let Some(pk) = instance.primary_key() {
			condition = condition & FilterCondition::not(Self::pk_condition(pk)?);
		}
		self.filter(condition).await
	}
}
