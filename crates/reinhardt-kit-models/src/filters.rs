//! Queryset filter expressions
//!
//! Filters are evaluated against the serialized field map of a model, with
//! SQL three-valued logic: a comparison involving `NULL` is *unknown*, and an
//! unknown condition never matches a row (not even under `NOT`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, Not};

/// Comparison operator of a single [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	/// Field value is one of the values of a [`FilterValue::Array`]
	In,
	/// Is null check
	IsNull,
	/// Is not null check
	IsNotNull,
}

/// Right-hand side of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
	String(String),
	Integer(i64),
	Float(f64),
	Boolean(bool),
	DateTime(DateTime<Utc>),
	Null,
	Array(Vec<FilterValue>),
	/// Another field of the same row, like Django's `F()` expressions
	Field(String),
}

impl FilterValue {
	/// Converts a serialized field value into a filter value.
	///
	/// Objects have no filter representation and become [`FilterValue::Null`].
	pub fn from_json(value: &Value) -> Self {
		match value {
			Value::Null | Value::Object(_) => Self::Null,
			Value::Bool(b) => Self::Boolean(*b),
			Value::Number(n) => match n.as_i64() {
				Some(i) => Self::Integer(i),
				None => Self::Float(n.as_f64().unwrap_or_default()),
			},
			Value::String(s) => Self::String(s.clone()),
			Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
		}
	}

	/// Converts the value back into JSON, the representation used by stores.
	pub fn to_json(&self) -> Value {
		match self {
			Self::String(s) => Value::String(s.clone()),
			Self::Integer(i) => Value::from(*i),
			Self::Float(f) => Value::from(*f),
			Self::Boolean(b) => Value::Bool(*b),
			Self::DateTime(dt) => Value::String(dt.to_rfc3339()),
			Self::Null => Value::Null,
			Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
			Self::Field(_) => Value::Null,
		}
	}

	/// References another field of the row being filtered.
	pub fn field(name: impl Into<String>) -> Self {
		Self::Field(name.into())
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}
}

impl From<&str> for FilterValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for FilterValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<i64> for FilterValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<i32> for FilterValue {
	fn from(value: i32) -> Self {
		Self::Integer(i64::from(value))
	}
}

impl From<f64> for FilterValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<bool> for FilterValue {
	fn from(value: bool) -> Self {
		Self::Boolean(value)
	}
}

impl From<DateTime<Utc>> for FilterValue {
	fn from(value: DateTime<Utc>) -> Self {
		Self::DateTime(value)
	}
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
	fn from(values: Vec<T>) -> Self {
		Self::Array(values.into_iter().map(Into::into).collect())
	}
}

/// A single `field <op> value` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: FilterValue,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
		Self {
			field: field.into(),
			operator,
			value,
		}
	}

	/// Evaluates the filter against a row.
	///
	/// Returns `None` when the outcome is unknown (a `NULL` operand).
	pub fn evaluate(&self, row: &Map<String, Value>) -> Option<bool> {
		let lhs = row.get(&self.field).unwrap_or(&Value::Null);
		if let FilterValue::Field(other) = &self.value {
			let rhs = FilterValue::from_json(row.get(other).unwrap_or(&Value::Null));
			return Filter::new(self.field.clone(), self.operator, rhs).evaluate(row);
		}
		match self.operator {
			FilterOperator::IsNull => Some(lhs.is_null()),
			FilterOperator::IsNotNull => Some(!lhs.is_null()),
			FilterOperator::In => {
				if lhs.is_null() {
					return None;
				}
				let FilterValue::Array(candidates) = &self.value else {
					return Some(false);
				};
				Some(
					candidates
						.iter()
						.any(|candidate| compare(lhs, candidate) == Some(Ordering::Equal)),
				)
			}
			FilterOperator::Eq => compare(lhs, &self.value).map(|o| o == Ordering::Equal),
			FilterOperator::Ne => compare(lhs, &self.value).map(|o| o != Ordering::Equal),
			FilterOperator::Gt => compare(lhs, &self.value).map(|o| o == Ordering::Greater),
			FilterOperator::Gte => compare(lhs, &self.value).map(|o| o != Ordering::Less),
			FilterOperator::Lt => compare(lhs, &self.value).map(|o| o == Ordering::Less),
			FilterOperator::Lte => compare(lhs, &self.value).map(|o| o != Ordering::Greater),
		}
	}
}

/// Composite filter condition supporting AND, OR and NOT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterCondition {
	/// A single filter expression
	Single(Filter),
	/// All conditions must match (AND logic)
	And(Vec<FilterCondition>),
	/// At least one condition must match (OR logic)
	Or(Vec<FilterCondition>),
	/// Negates the condition
	Not(Box<FilterCondition>),
}

impl FilterCondition {
	pub fn single(filter: Filter) -> Self {
		Self::Single(filter)
	}

	pub fn and(conditions: Vec<FilterCondition>) -> Self {
		Self::And(conditions)
	}

	pub fn or(conditions: Vec<FilterCondition>) -> Self {
		Self::Or(conditions)
	}

	#[allow(clippy::should_implement_trait)]
	pub fn not(condition: FilterCondition) -> Self {
		Self::Not(Box::new(condition))
	}

	/// A condition matching every row (an empty AND).
	pub fn everything() -> Self {
		Self::And(Vec::new())
	}

	pub fn eq(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Eq, value)
	}

	pub fn ne(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Ne, value)
	}

	pub fn gt(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Gt, value)
	}

	pub fn gte(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Gte, value)
	}

	pub fn lt(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Lt, value)
	}

	pub fn lte(field: &str, value: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::Lte, value)
	}

	pub fn is_in(field: &str, values: impl Into<FilterValue>) -> Self {
		Self::compare(field, FilterOperator::In, values)
	}

	pub fn is_null(field: &str) -> Self {
		Self::compare(field, FilterOperator::IsNull, FilterValue::Null)
	}

	pub fn is_not_null(field: &str) -> Self {
		Self::compare(field, FilterOperator::IsNotNull, FilterValue::Null)
	}

	fn compare(field: &str, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
		Self::Single(Filter::new(field, operator, value.into()))
	}

	/// Evaluates the condition with Kleene logic.
	pub fn evaluate(&self, row: &Map<String, Value>) -> Option<bool> {
		match self {
			Self::Single(filter) => filter.evaluate(row),
			Self::And(conditions) => {
				let mut unknown = false;
				for condition in conditions {
					match condition.evaluate(row) {
						Some(false) => return Some(false),
						None => unknown = true,
						Some(true) => {}
					}
				}
				if unknown { None } else { Some(true) }
			}
			Self::Or(conditions) => {
				let mut unknown = false;
				for condition in conditions {
					match condition.evaluate(row) {
						Some(true) => return Some(true),
						None => unknown = true,
						Some(false) => {}
					}
				}
				if unknown { None } else { Some(false) }
			}
			Self::Not(condition) => condition.evaluate(row).map(|matched| !matched),
		}
	}

	/// Whether a row is selected by the condition, as a `WHERE` clause would.
	pub fn matches(&self, row: &Map<String, Value>) -> bool {
		self.evaluate(row) == Some(true)
	}
}

impl BitAnd for FilterCondition {
	type Output = FilterCondition;

	fn bitand(self, rhs: Self) -> Self::Output {
		match self {
			Self::And(mut conditions) => {
				conditions.push(rhs);
				Self::And(conditions)
			}
			lhs => Self::And(vec![lhs, rhs]),
		}
	}
}

impl BitOr for FilterCondition {
	type Output = FilterCondition;

	fn bitor(self, rhs: Self) -> Self::Output {
		match self {
			Self::Or(mut conditions) => {
				conditions.push(rhs);
				Self::Or(conditions)
			}
			lhs => Self::Or(vec![lhs, rhs]),
		}
	}
}

impl Not for FilterCondition {
	type Output = FilterCondition;

	fn not(self) -> Self::Output {
		Self::Not(Box::new(self))
	}
}

/// Sort key of a queryset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
	pub field: String,
	pub descending: bool,
}

impl OrderBy {
	pub fn asc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			descending: false,
		}
	}

	pub fn desc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			descending: true,
		}
	}
}

/// Sorts rows by the given keys. Nulls sort last ascending, first descending.
pub fn sort_rows(rows: &mut [Map<String, Value>], order_by: &[OrderBy]) {
	rows.sort_by(|a, b| {
		for key in order_by {
			let lhs = a.get(&key.field).unwrap_or(&Value::Null);
			let rhs = b.get(&key.field).unwrap_or(&Value::Null);
			let ordering = compare_json(lhs, rhs);
			let ordering = if key.descending {
				ordering.reverse()
			} else {
				ordering
			};
			if ordering != Ordering::Equal {
				return ordering;
			}
		}
		Ordering::Equal
	});
}

/// Total order over JSON values used for sorting.
fn compare_json(lhs: &Value, rhs: &Value) -> Ordering {
	match (lhs, rhs) {
		(Value::Null, Value::Null) => Ordering::Equal,
		(Value::Null, _) => Ordering::Greater,
		(_, Value::Null) => Ordering::Less,
		_ => compare(lhs, &FilterValue::from_json(rhs)).unwrap_or(Ordering::Equal),
	}
}

/// Compares a stored value with a filter value.
///
/// Strings that both parse as RFC 3339 timestamps compare chronologically, so
/// values differing only in fractional-second precision still order correctly.
fn compare(lhs: &Value, rhs: &FilterValue) -> Option<Ordering> {
	match (lhs, rhs) {
		(Value::Null, _) | (_, FilterValue::Null) => None,
		(Value::Number(n), FilterValue::Integer(i)) => match n.as_i64() {
			Some(l) => Some(l.cmp(i)),
			None => n.as_f64()?.partial_cmp(&(*i as f64)),
		},
		(Value::Number(n), FilterValue::Float(f)) => n.as_f64()?.partial_cmp(f),
		(Value::Bool(l), FilterValue::Boolean(r)) => Some(l.cmp(r)),
		(Value::String(l), FilterValue::DateTime(r)) => Some(parse_datetime(l)?.cmp(r)),
		(Value::String(l), FilterValue::String(r)) => match (parse_datetime(l), parse_datetime(r)) {
			(Some(l), Some(r)) => Some(l.cmp(&r)),
			_ => Some(l.as_str().cmp(r.as_str())),
		},
		_ => None,
	}
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.ok()
		.map(|dt| dt.with_timezone(&Utc))
}
