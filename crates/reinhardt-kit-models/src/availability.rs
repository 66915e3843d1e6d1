//! Availability windows
//!
//! A model with an optional `starts_at` / `ends_at` pair is *future* before it
//! starts, *current* while running and *past* once ended. The boundary instant
//! itself already counts as the past.

use crate::filters::{FilterCondition, FilterValue};
use crate::model::{Constraint, Model};
use chrono::{DateTime, Utc};

/// A model available within an optional time window.
pub trait Available: Model {
	fn starts_at(&self) -> Option<DateTime<Utc>>;

	fn ends_at(&self) -> Option<DateTime<Utc>>;

	fn availability(&self) -> AvailabilityChecker {
		AvailabilityChecker::new(self.starts_at(), self.ends_at())
	}

	fn is_future(&self) -> bool {
		self.availability().is_future()
	}

	fn is_past(&self) -> bool {
		self.availability().is_past()
	}

	fn is_current(&self) -> bool {
		self.availability().is_current()
	}
}

/// Classifies a window relative to an instant.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use reinhardt_kit_models::AvailabilityChecker;
///
/// let now = Utc::now();
/// let checker = AvailabilityChecker::new(Some(now - Duration::days(1)), None).at(now);
/// assert!(checker.is_current());
///
/// // Ending exactly now is already the past
/// let checker = AvailabilityChecker::new(None, Some(now)).at(now);
/// assert!(checker.is_past());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityChecker {
	pub starts_at: Option<DateTime<Utc>>,
	pub ends_at: Option<DateTime<Utc>>,
	pub at: DateTime<Utc>,
}

impl AvailabilityChecker {
	/// Checker evaluated at the current instant.
	pub fn new(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> Self {
		Self {
			starts_at,
			ends_at,
			at: Utc::now(),
		}
	}

	/// Evaluates at `at` instead of now.
	pub fn at(mut self, at: DateTime<Utc>) -> Self {
		self.at = at;
		self
	}

	pub fn is_future(&self) -> bool {
		self.future_start() && (self.future_end() || self.ends_at.is_none())
	}

	pub fn is_past(&self) -> bool {
		(self.past_start() || self.starts_at.is_none()) && self.past_end()
	}

	pub fn is_current(&self) -> bool {
		(self.past_start() || self.starts_at.is_none())
			&& (self.future_end() || self.ends_at.is_none())
	}

	fn past_start(&self) -> bool {
		self.starts_at.is_some_and(|starts_at| starts_at <= self.at)
	}

	fn past_end(&self) -> bool {
		self.ends_at.is_some_and(|ends_at| ends_at <= self.at)
	}

	fn future_start(&self) -> bool {
		self.starts_at.is_some_and(|starts_at| starts_at > self.at)
	}

	fn future_end(&self) -> bool {
		self.ends_at.is_some_and(|ends_at| ends_at > self.at)
	}
}

/// Queryset conditions matching [`AvailabilityChecker`].
pub struct AvailabilityFilters;

const STARTS_AT: &str = "starts_at";
const ENDS_AT: &str = "ends_at";

impl AvailabilityFilters {
	pub fn future(at: DateTime<Utc>) -> FilterCondition {
		FilterCondition::gt(STARTS_AT, at)
			& (FilterCondition::gt(ENDS_AT, at) | FilterCondition::is_null(ENDS_AT))
	}

	pub fn past(at: DateTime<Utc>) -> FilterCondition {
		(FilterCondition::lte(STARTS_AT, at) | FilterCondition::is_null(STARTS_AT))
			& FilterCondition::lte(ENDS_AT, at)
	}

	pub fn current(at: DateTime<Utc>) -> FilterCondition {
		(FilterCondition::lte(STARTS_AT, at) | FilterCondition::is_null(STARTS_AT))
			& (FilterCondition::gt(ENDS_AT, at) | FilterCondition::is_null(ENDS_AT))
	}

	/// Windows that overlap `starts_at..ends_at`.
	///
	/// Fully open windows always overlap. Without any bound, everything
	/// matches.
	pub fn same_availability(
		starts_at: Option<DateTime<Utc>>,
		ends_at: Option<DateTime<Utc>>,
	) -> FilterCondition {
		if starts_at.is_none() && ends_at.is_none() {
			return FilterCondition::everything();
		}

		let mut filters = FilterCondition::is_null(STARTS_AT) & FilterCondition::is_null(ENDS_AT);

		if let Some(ends_at) = ends_at {
			// Overlapping the end
			filters = filters
				| (FilterCondition::is_null(STARTS_AT) & FilterCondition::gte(ENDS_AT, ends_at))
				| (FilterCondition::lt(STARTS_AT, ends_at) & FilterCondition::gte(ENDS_AT, ends_at))
				| (FilterCondition::is_null(STARTS_AT) & FilterCondition::lte(ENDS_AT, ends_at));
			if let Some(starts_at) = starts_at {
				filters = filters | Self::within(starts_at, ends_at);
			}
		}

		if let Some(starts_at) = starts_at {
			// Overlapping the start
			filters = filters
				| (FilterCondition::lte(STARTS_AT, starts_at) & FilterCondition::is_null(ENDS_AT))
				| (FilterCondition::lte(STARTS_AT, starts_at) & FilterCondition::gt(ENDS_AT, starts_at))
				| (FilterCondition::gte(STARTS_AT, starts_at) & FilterCondition::is_null(ENDS_AT));
			if let Some(ends_at) = ends_at {
				filters = filters | Self::within(starts_at, ends_at);
			}
		}

		filters
	}

	fn within(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> FilterCondition {
		FilterCondition::gte(STARTS_AT, starts_at) & FilterCondition::lte(ENDS_AT, ends_at)
	}
}

/// `<table>_invalid_date_range`: a window never ends before it starts.
pub fn availability_constraint<M: Available>() -> Constraint {
	Constraint::check(
		format!("{}_invalid_date_range", M::table_name()),
		FilterCondition::lte(STARTS_AT, FilterValue::field(ENDS_AT)),
		"starts_at <= ends_at",
	)
}
