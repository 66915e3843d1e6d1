//! Model trait, timestamps, and declared constraints

use crate::error::{ModelError, ModelResult};
use crate::filters::{FilterCondition, OrderBy};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A persisted record.
///
/// Models are plain serde structs; stores keep them as serialized field maps,
/// so every field name used in filters or groupings must match the serialized
/// name.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::Model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Prize {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Model for Prize {
///     type PrimaryKey = i64;
///     fn table_name() -> &'static str { "prizes" }
///     fn model_name() -> &'static str { "Prize" }
///     fn primary_key(&self) -> Option<&Self::PrimaryKey> { self.id.as_ref() }
///     fn set_primary_key(&mut self, pk: Self::PrimaryKey) { self.id = Some(pk); }
/// }
///
/// assert_eq!(Prize::primary_key_field(), "id");
/// ```
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// Primary key type. Stores assign it on insert.
	type PrimaryKey: Clone
		+ Eq
		+ Hash
		+ Ord
		+ Debug
		+ Display
		+ Serialize
		+ DeserializeOwned
		+ Send
		+ Sync
		+ 'static;

	fn table_name() -> &'static str;

	/// Class-style name used in messages and discriminators (`"Prize"`).
	fn model_name() -> &'static str;

	fn primary_key(&self) -> Option<&Self::PrimaryKey>;

	fn set_primary_key(&mut self, pk: Self::PrimaryKey);

	fn primary_key_field() -> &'static str {
		"id"
	}

	/// Creation/update timestamps, when the model tracks them.
	fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
		None
	}

	/// Constraints enforced by the store on every write.
	fn constraints() -> Vec<Constraint> {
		Vec::new()
	}

	/// Default ordering of querysets.
	fn ordering() -> Vec<OrderBy> {
		vec![OrderBy::asc(Self::primary_key_field())]
	}
}

/// `created_at` / `updated_at` pair, flattened into the model's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl Timestamps {
	/// Sets `updated_at`, and `created_at` when it was never set.
	pub fn touch(&mut self, now: DateTime<Utc>) {
		if self.created_at.is_none() {
			self.created_at = Some(now);
		}
		self.updated_at = Some(now);
	}
}

/// Table-level constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
	/// The combination of `fields` is unique. Rows with a `NULL` in any of the
	/// fields never collide.
	Unique {
		name: String,
		fields: Vec<String>,
	},
	/// `check` must not evaluate to false. Unknown (`NULL`) passes.
	Check {
		name: String,
		check: FilterCondition,
		/// Human readable statement of the check, used in error messages.
		description: String,
	},
}

impl Constraint {
	pub fn unique(name: impl Into<String>, fields: &[&str]) -> Self {
		Self::Unique {
			name: name.into(),
			fields: fields.iter().map(|f| f.to_string()).collect(),
		}
	}

	pub fn check(
		name: impl Into<String>,
		check: FilterCondition,
		description: impl Into<String>,
	) -> Self {
		Self::Check {
			name: name.into(),
			check,
			description: description.into(),
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Unique { name, .. } | Self::Check { name, .. } => name,
		}
	}
}

/// Serializes a model into its field map.
pub fn as_dict<M: Model>(instance: &M) -> ModelResult<Map<String, Value>> {
	match serde_json::to_value(instance)? {
		Value::Object(map) => Ok(map),
		other => Err(ModelError::InvalidRecord(format!(
			"{} serialized to {} instead of an object",
			M::model_name(),
			other
		))),
	}
}

/// Rebuilds a model from its field map.
pub fn from_dict<M: Model>(row: Map<String, Value>) -> ModelResult<M> {
	Ok(serde_json::from_value(Value::Object(row))?)
}
