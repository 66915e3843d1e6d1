//! Grouping keys and sibling resolution

use super::Ordered;
use crate::error::{ModelError, ModelResult};
use crate::filters::{FilterCondition, FilterValue, OrderBy};
use crate::model::as_dict;
use crate::store::Store;
use serde_json::Value;
use std::marker::PhantomData;

/// The fields whose values partition a table into position sequences.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::ordering::Grouping;
///
/// assert!(Grouping::global().is_global());
/// assert_eq!(Grouping::by(&["year"]).fields(), ["year"]);
/// assert!(Grouping::try_by(&["year", ""]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
	fields: Vec<String>,
}

impl Grouping {
	/// One sequence per distinct combination of `fields`.
	pub fn by(fields: &[&str]) -> Self {
		Self {
			fields: fields.iter().map(|f| f.to_string()).collect(),
		}
	}

	/// Like [`Grouping::by`], rejecting empty field names up front.
	pub fn try_by(fields: &[&str]) -> Result<Self, String> {
		if fields.iter().any(|f| f.trim().is_empty()) {
			return Err("grouping field names must not be empty".to_string());
		}
		Ok(Self::by(fields))
	}

	/// A single sequence for the whole table.
	pub fn global() -> Self {
		Self { fields: Vec::new() }
	}

	pub fn fields(&self) -> &[String] {
		&self.fields
	}

	pub fn is_global(&self) -> bool {
		self.fields.is_empty()
	}
}

/// Finds the members sharing an entity's grouping.
pub struct GroupingResolver<M: Ordered> {
	/// Restricts siblings to active rows (e.g. not soft-deleted)
	active: Option<FilterCondition>,
	_model: PhantomData<fn() -> M>,
}

impl<M: Ordered> GroupingResolver<M> {
	pub fn new(active: Option<FilterCondition>) -> Self {
		Self {
			active,
			_model: PhantomData,
		}
	}

	/// The serialized grouping values of `instance`, in grouping order.
	pub fn group_key(&self, instance: &M) -> ModelResult<Vec<(String, Value)>> {
		let dict = as_dict(instance)?;
		M::grouping()
			.fields()
			.iter()
			.map(|field| {
				if field.trim().is_empty() {
					return Err(self.invalid("empty grouping field name".to_string()));
				}
				dict.get(field)
					.map(|value| (field.clone(), value.clone()))
					.ok_or_else(|| self.invalid(format!("field `{}` does not exist", field)))
			})
			.collect()
	}

	/// Condition selecting the active rows of `instance`'s grouping, itself
	/// excluded.
	pub fn sibling_condition(&self, instance: &M) -> ModelResult<FilterCondition> {
		let mut conditions: Vec<FilterCondition> = self
			.group_key(instance)?
			.into_iter()
			.map(|(field, value)| match FilterValue::from_json(&value) {
				FilterValue::Null => FilterCondition::is_null(&field),
				value => FilterCondition::eq(&field, value),
			})
			.collect();
		if let Some(pk) = instance.primary_key() {
			let pk = FilterValue::from_json(&serde_json::to_value(pk)?);
			conditions.push(FilterCondition::not(FilterCondition::eq(
				M::primary_key_field(),
				pk,
			)));
		}
		if let Some(active) = &self.active {
			conditions.push(active.clone());
		}
		Ok(FilterCondition::and(conditions))
	}

	/// Siblings sorted by position, most recently updated first on ties.
	pub async fn siblings(&self, store: &dyn Store<M>, instance: &M) -> ModelResult<Vec<M>> {
		let condition = self.sibling_condition(instance)?;
		store.filter(&condition, &Self::sibling_ordering()).await
	}

	fn sibling_ordering() -> Vec<OrderBy> {
		vec![
			OrderBy::asc(M::order_field()),
			OrderBy::desc("updated_at"),
			OrderBy::asc(M::primary_key_field()),
		]
	}

	fn invalid(&self, reason: String) -> ModelError {
		ModelError::InvalidGrouping {
			model: M::model_name().to_string(),
			reason,
		}
	}
}

impl<M: Ordered> Clone for GroupingResolver<M> {
	fn clone(&self) -> Self {
		Self::new(self.active.clone())
	}
}
