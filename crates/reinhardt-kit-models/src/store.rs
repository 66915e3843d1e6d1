//! Storage seam for managers
//!
//! [`Store`] is the minimal persistence interface the behaviors need. Writes
//! through [`Store::update_fields`] and [`Store::update_where`] are raw field
//! writes: they never reach behaviors or signals.

use crate::error::{IntegrityError, ModelError, ModelResult};
use crate::filters::{FilterCondition, OrderBy, sort_rows};
use crate::model::{Constraint, Model, as_dict, from_dict};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Persistence backend for a single model type.
#[async_trait]
pub trait Store<M: Model>: Send + Sync {
	/// Inserts a new row, assigning the primary key when the instance has none.
	async fn insert(&self, instance: M) -> ModelResult<M>;

	/// Overwrites every field of an existing row.
	async fn update(&self, instance: &M) -> ModelResult<()>;

	/// Writes the given fields of one row.
	///
	/// Fails with [`ModelError::NotFound`] when the row does not exist.
	async fn update_fields(&self, pk: &M::PrimaryKey, fields: Map<String, Value>)
	-> ModelResult<()>;

	/// Writes the given fields on every row matching `condition`, returning
	/// the number of rows written.
	async fn update_where(
		&self,
		condition: &FilterCondition,
		fields: Map<String, Value>,
	) -> ModelResult<usize>;

	async fn get(&self, pk: &M::PrimaryKey) -> ModelResult<Option<M>>;

	async fn filter(&self, condition: &FilterCondition, order_by: &[OrderBy])
	-> ModelResult<Vec<M>>;

	/// Deletes one row. Returns `false` when it did not exist.
	async fn delete(&self, pk: &M::PrimaryKey) -> ModelResult<bool>;

	async fn count(&self, condition: &FilterCondition) -> ModelResult<usize>;
}

/// In-memory store keeping rows as serialized field maps.
///
/// Primary keys are allocated from a counter starting at 1. Declared
/// [`Constraint`]s are enforced on every write and reported with SQLite
/// wording.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::{InMemoryStore, Model, Store};
/// use serde::{Deserialize, Serialize};
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
/// let store = InMemoryStore::<Tag>::new();
/// let tag = store.insert(Tag { id: None, name: "rust".into() }).await.unwrap();
/// assert_eq!(tag.id, Some(1));
/// # });
/// ```
pub struct InMemoryStore<M: Model> {
	rows: RwLock<BTreeMap<M::PrimaryKey, Map<String, Value>>>,
	next_id: AtomicI64,
}

impl<M: Model> InMemoryStore<M> {
	pub fn new() -> Self {
		Self {
			rows: RwLock::new(BTreeMap::new()),
			next_id: AtomicI64::new(1),
		}
	}

	pub fn len(&self) -> usize {
		self.rows.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.read().is_empty()
	}
}

impl<M: Model> Default for InMemoryStore<M> {
	fn default() -> Self {
		Self::new()
	}
}

impl<M: Model> std::fmt::Debug for InMemoryStore<M> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InMemoryStore")
			.field("table", &M::table_name())
			.field("rows", &self.len())
			.finish()
	}
}

/// Checks `row` against the declared constraints and every other row.
fn validate<M: Model>(
	pk: &M::PrimaryKey,
	row: &Map<String, Value>,
	rows: &BTreeMap<M::PrimaryKey, Map<String, Value>>,
) -> Result<(), IntegrityError> {
	for constraint in M::constraints() {
		match constraint {
			Constraint::Unique { fields, .. } => {
				let values: Vec<&Value> = fields
					.iter()
					.map(|f| row.get(f).unwrap_or(&Value::Null))
					.collect();
				if values.iter().any(|v| v.is_null()) {
					continue;
				}
				let collides = rows.iter().any(|(other_pk, other)| {
					other_pk != pk
						&& fields
							.iter()
							.zip(&values)
							.all(|(f, v)| other.get(f) == Some(*v))
				});
				if collides {
					let columns: Vec<String> = fields
						.iter()
						.map(|f| format!("{}.{}", M::table_name(), f))
						.collect();
					return Err(IntegrityError::new(format!(
						"UNIQUE constraint failed: {}",
						columns.join(", ")
					)));
				}
			}
			Constraint::Check { name, check, .. } => {
				if check.evaluate(row) == Some(false) {
					return Err(IntegrityError::new(format!(
						"CHECK constraint failed: {}",
						name
					)));
				}
			}
		}
	}
	Ok(())
}

#[async_trait]
impl<M> Store<M> for InMemoryStore<M>
where
	M: Model,
	M::PrimaryKey: From<i64>,
{
	async fn insert(&self, mut instance: M) -> ModelResult<M> {
		let mut rows = self.rows.write();
		let pk = match instance.primary_key() {
			Some(pk) => pk.clone(),
			None => {
				let pk = M::PrimaryKey::from(self.next_id.fetch_add(1, Ordering::SeqCst));
				instance.set_primary_key(pk.clone());
				pk
			}
		};
		if rows.contains_key(&pk) {
			return Err(IntegrityError::new(format!(
				"UNIQUE constraint failed: {}.{}",
				M::table_name(),
				M::primary_key_field()
			))
			.into());
		}
		let row = as_dict(&instance)?;
		validate::<M>(&pk, &row, &rows)?;
		rows.insert(pk, row);
		Ok(instance)
	}

	async fn update(&self, instance: &M) -> ModelResult<()> {
		let pk = instance
			.primary_key()
			.ok_or_else(|| ModelError::InvalidRecord("cannot update an unsaved instance".into()))?;
		let mut rows = self.rows.write();
		if !rows.contains_key(pk) {
			return Err(ModelError::not_found::<M>(pk));
		}
		let row = as_dict(instance)?;
		validate::<M>(pk, &row, &rows)?;
		rows.insert(pk.clone(), row);
		Ok(())
	}

	async fn update_fields(
		&self,
		pk: &M::PrimaryKey,
		fields: Map<String, Value>,
	) -> ModelResult<()> {
		let mut rows = self.rows.write();
		let mut row = rows
			.get(pk)
			.cloned()
			.ok_or_else(|| ModelError::not_found::<M>(pk))?;
		row.extend(fields);
		validate::<M>(pk, &row, &rows)?;
		rows.insert(pk.clone(), row);
		Ok(())
	}

	async fn update_where(
		&self,
		condition: &FilterCondition,
		fields: Map<String, Value>,
	) -> ModelResult<usize> {
		let mut rows = self.rows.write();
		let matched: Vec<M::PrimaryKey> = rows
			.iter()
			.filter(|(_, row)| condition.matches(row))
			.map(|(pk, _)| pk.clone())
			.collect();
		for pk in &matched {
			let Some(mut row) = rows.get(pk).cloned() else {
				continue;
			};
			row.extend(fields.clone());
			validate::<M>(pk, &row, &rows)?;
			rows.insert(pk.clone(), row);
		}
		Ok(matched.len())
	}

	async fn get(&self, pk: &M::PrimaryKey) -> ModelResult<Option<M>> {
		let row = self.rows.read().get(pk).cloned();
		row.map(from_dict).transpose()
	}

	async fn filter(
		&self,
		condition: &FilterCondition,
		order_by: &[OrderBy],
	) -> ModelResult<Vec<M>> {
		let mut selected: Vec<Map<String, Value>> = self
			.rows
			.read()
			.values()
			.filter(|row| condition.matches(row))
			.cloned()
			.collect();
		sort_rows(&mut selected, order_by);
		selected.into_iter().map(from_dict).collect()
	}

	async fn delete(&self, pk: &M::PrimaryKey) -> ModelResult<bool> {
		Ok(self.rows.write().remove(pk).is_some())
	}

	async fn count(&self, condition: &FilterCondition) -> ModelResult<usize> {
		Ok(self
			.rows
			.read()
			.values()
			.filter(|row| condition.matches(row))
			.count())
	}
}
