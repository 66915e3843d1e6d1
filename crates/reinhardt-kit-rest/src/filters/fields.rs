use super::{FilterError, FilterResult, QueryFilter};
use chrono::{DateTime, Utc};
use reinhardt_kit_models::{AvailabilityFilters, FilterCondition, FilterValue};

/// How raw query values are read before comparing them with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
	#[default]
	Text,
	Integer,
}

impl ValueKind {
	fn parse(self, raw: &str) -> Result<FilterValue, String> {
		match self {
			Self::Text => Ok(FilterValue::from(raw)),
			Self::Integer => raw
				.trim()
				.parse::<i64>()
				.map(FilterValue::from)
				.map_err(|_| format!("Select a valid choice. {} is not one of the available choices.", raw)),
		}
	}
}

/// `field IN (...)` over every value of a repeated parameter.
///
/// Any value is accepted as a choice. Blank values are dropped, and without
/// any value left the filter does nothing.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_rest::filters::{AnyOfFilter, QueryFilter};
/// use reinhardt_kit_models::FilterCondition;
///
/// let filter = AnyOfFilter::new("status");
/// let values = vec!["draft".to_string(), "live".to_string()];
///
/// assert_eq!(
///     filter.condition(&values).unwrap(),
///     Some(FilterCondition::is_in("status", vec!["draft", "live"])),
/// );
/// assert_eq!(filter.condition(&[]).unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct AnyOfFilter {
	field: String,
	param: String,
	kind: ValueKind,
}

impl AnyOfFilter {
	/// Filters `field` from the parameter of the same name.
	pub fn new(field: &str) -> Self {
		Self {
			field: field.to_string(),
			param: field.to_string(),
			kind: ValueKind::Text,
		}
	}

	pub fn param(mut self, param: &str) -> Self {
		self.param = param.to_string();
		self
	}

	/// Reads the values as integers.
	pub fn integers(mut self) -> Self {
		self.kind = ValueKind::Integer;
		self
	}
}

impl QueryFilter for AnyOfFilter {
	fn param(&self) -> &str {
		&self.param
	}

	fn condition(&self, values: &[String]) -> FilterResult<Option<FilterCondition>> {
		let parsed = values
			.iter()
			.filter(|raw| !raw.is_empty())
			.map(|raw| self.kind.parse(raw))
			.collect::<Result<Vec<_>, _>>()
			.map_err(|message| FilterError::InvalidParameter {
				param: self.param.clone(),
				message,
			})?;
		if parsed.is_empty() {
			return Ok(None);
		}
		Ok(Some(FilterCondition::is_in(
			&self.field,
			FilterValue::Array(parsed),
		)))
	}
}

/// Integer flag: `1` filters `field = true`, `0` filters `field = false`,
/// any other number does nothing.
#[derive(Debug, Clone)]
pub struct IntBooleanFilter {
	field: String,
	param: String,
	initial: Option<i64>,
}

impl IntBooleanFilter {
	pub fn new(field: &str) -> Self {
		Self {
			field: field.to_string(),
			param: field.to_string(),
			initial: None,
		}
	}

	pub fn param(mut self, param: &str) -> Self {
		self.param = param.to_string();
		self
	}

	pub fn initial(mut self, initial: i64) -> Self {
		self.initial = Some(initial);
		self
	}

	/// `1` is true, `0` is false, everything else is undecided.
	pub fn get_logic(value: i64) -> Option<bool> {
		match value {
			1 => Some(true),
			0 => Some(false),
			_ => None,
		}
	}

	/// Reads the last value of an integer flag. Blank means undecided.
	pub(crate) fn parse_logic(param: &str, values: &[String]) -> FilterResult<Option<bool>> {
		let Some(raw) = values.last().map(|raw| raw.trim()).filter(|raw| !raw.is_empty()) else {
			return Ok(None);
		};
		let value = raw.parse::<i64>().map_err(|_| FilterError::InvalidParameter {
			param: param.to_string(),
			message: "Enter a whole number.".to_string(),
		})?;
		Ok(Self::get_logic(value))
	}
}

impl QueryFilter for IntBooleanFilter {
	fn param(&self) -> &str {
		&self.param
	}

	fn initial(&self) -> Option<String> {
		self.initial.map(|initial| initial.to_string())
	}

	fn condition(&self, values: &[String]) -> FilterResult<Option<FilterCondition>> {
		Ok(Self::parse_logic(&self.param, values)?
			.map(|logic| FilterCondition::eq(&self.field, logic)))
	}
}

/// `include_unavailable` flag, `0` by default.
///
/// Unless the client sends `include_unavailable=1` (or any number other than
/// `0`), only rows whose availability window contains the current instant
/// are listed.
#[derive(Debug, Clone, Default)]
pub struct IncludeUnavailableFilter {
	at: Option<DateTime<Utc>>,
}

impl IncludeUnavailableFilter {
	pub const PARAM: &'static str = "include_unavailable";

	pub fn new() -> Self {
		Self::default()
	}

	/// Evaluates availability at `at` instead of the time of the request.
	pub fn at(mut self, at: DateTime<Utc>) -> Self {
		self.at = Some(at);
		self
	}
}

impl QueryFilter for IncludeUnavailableFilter {
	fn param(&self) -> &str {
		Self::PARAM
	}

	fn initial(&self) -> Option<String> {
		Some("0".to_string())
	}

	fn condition(&self, values: &[String]) -> FilterResult<Option<FilterCondition>> {
		match IntBooleanFilter::parse_logic(Self::PARAM, values)? {
			Some(false) => Ok(Some(AvailabilityFilters::current(
				self.at.unwrap_or_else(Utc::now),
			))),
			Some(true) | None => Ok(None),
		}
	}
}
