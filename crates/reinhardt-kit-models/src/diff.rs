//! Field-level change tracking

use crate::error::ModelResult;
use crate::model::{Model, as_dict};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// `(old, new)` value pair of a changed field.
pub type FieldDiff = (Value, Value);

/// An instance together with the snapshot taken when it was loaded or last
/// saved.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::{Model, Tracked};
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Team { id: Option<i64>, name: String }
///
/// impl Model for Team {
///     type PrimaryKey = i64;
///     fn table_name() -> &'static str { "teams" }
///     fn model_name() -> &'static str { "Team" }
///     fn primary_key(&self) -> Option<&i64> { self.id.as_ref() }
///     fn set_primary_key(&mut self, pk: i64) { self.id = Some(pk); }
/// }
///
/// let mut team = Tracked::new(Team { id: Some(1), name: "Ajax".into() }).unwrap();
/// assert!(!team.has_changed().unwrap());
///
/// team.name = "Feyenoord".into();
/// assert_eq!(
///     team.field_diff("name").unwrap(),
///     Some((json!("Ajax"), json!("Feyenoord")))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Tracked<M: Model> {
	instance: M,
	initial: Map<String, Value>,
}

impl<M: Model> Tracked<M> {
	pub fn new(instance: M) -> ModelResult<Self> {
		let initial = as_dict(&instance)?;
		Ok(Self { instance, initial })
	}

	/// Changed fields with their `(old, new)` values.
	pub fn diff(&self) -> ModelResult<BTreeMap<String, FieldDiff>> {
		let current = as_dict(&self.instance)?;
		Ok(self
			.initial
			.iter()
			.filter_map(|(field, old)| {
				let new = current.get(field).cloned().unwrap_or(Value::Null);
				(*old != new).then(|| (field.clone(), (old.clone(), new)))
			})
			.collect())
	}

	pub fn has_changed(&self) -> ModelResult<bool> {
		Ok(!self.diff()?.is_empty())
	}

	pub fn changed_fields(&self) -> ModelResult<Vec<String>> {
		Ok(self.diff()?.into_keys().collect())
	}

	pub fn field_diff(&self, field: &str) -> ModelResult<Option<FieldDiff>> {
		Ok(self.diff()?.remove(field))
	}

	/// Takes a fresh snapshot; called after the instance was persisted.
	pub fn mark_saved(&mut self) -> ModelResult<()> {
		self.initial = as_dict(&self.instance)?;
		Ok(())
	}

	pub fn into_inner(self) -> M {
		self.instance
	}
}

impl<M: Model> Deref for Tracked<M> {
	type Target = M;

	fn deref(&self) -> &M {
		&self.instance
	}
}

impl<M: Model> DerefMut for Tracked<M> {
	fn deref_mut(&mut self) -> &mut M {
		&mut self.instance
	}
}
