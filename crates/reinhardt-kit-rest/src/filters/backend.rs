use super::{FilterError, IncludeUnavailableFilter, QueryFilter, QueryParams};
use crate::error::{RestError, RestResult};
use reinhardt_kit_models::{FilterCondition, Manager, Model, ModelError};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Query filters applied together, each one narrowing the queryset.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_rest::filters::{AnyOfFilter, FilterSet, IntBooleanFilter};
/// use reinhardt_kit_models::FilterCondition;
/// use url::Url;
///
/// let filters = FilterSet::new()
///     .with(AnyOfFilter::new("status"))
///     .with(IntBooleanFilter::new("featured").initial(1));
/// let url = Url::parse("http://testserver/posts/?status=live").unwrap();
///
/// assert_eq!(
///     filters.condition(&url).unwrap(),
///     FilterCondition::and(vec![
///         FilterCondition::is_in("status", vec!["live"]),
///         FilterCondition::eq("featured", true),
///     ]),
/// );
/// ```
#[derive(Default, Clone)]
pub struct FilterSet {
	filters: Vec<Arc<dyn QueryFilter>>,
}

impl FilterSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Filters out rows that are not available now unless the client passes
	/// `include_unavailable=1`.
	pub fn include_unavailable() -> Self {
		Self::new().with(IncludeUnavailableFilter::new())
	}

	pub fn with(mut self, filter: impl QueryFilter + 'static) -> Self {
		self.filters.push(Arc::new(filter));
		self
	}

	pub fn filter_count(&self) -> usize {
		self.filters.len()
	}

	/// `params` with every blank parameter replaced by its filter's initial
	/// value.
	pub fn with_initials(&self, params: &QueryParams) -> QueryParams {
		let mut params = params.clone();
		for filter in &self.filters {
			if params.is_blank(filter.param())
				&& let Some(initial) = filter.initial()
			{
				params.set(filter.param(), initial);
			}
		}
		params
	}

	/// Combined condition for the request at `url`.
	///
	/// Every filter is evaluated; invalid parameters are reported together.
	pub fn condition(&self, url: &Url) -> RestResult<FilterCondition> {
		self.condition_for(&QueryParams::from_url(url))
	}

	pub fn condition_for(&self, params: &QueryParams) -> RestResult<FilterCondition> {
		let params = self.with_initials(params);
		let mut conditions = Vec::new();
		let mut errors = serde_json::Map::new();
		for filter in &self.filters {
			match filter.condition(params.get_all(filter.param())) {
				Ok(Some(condition)) => conditions.push(condition),
				Ok(None) => {}
				Err(FilterError::InvalidParameter { param, message }) => {
					errors.insert(param, Value::from(vec![message]));
				}
			}
		}
		if !errors.is_empty() {
			return Err(RestError::Validation(Value::Object(errors)));
		}
		Ok(match conditions.len() {
			0 => FilterCondition::everything(),
			1 => conditions.remove(0),
			_ => FilterCondition::and(conditions),
		})
	}
}

impl std::fmt::Debug for FilterSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let params: Vec<&str> = self.filters.iter().map(|filter| filter.param()).collect();
		f.debug_struct("FilterSet").field("params", &params).finish()
	}
}

/// Runs a [`FilterSet`] against a manager's default queryset.
///
/// Values the storage layer cannot compare are client errors, so they come
/// back as [`RestError::Validation`] (400) rather than server errors.
#[derive(Debug, Clone, Default)]
pub struct FilterBackend {
	filter_set: FilterSet,
}

impl FilterBackend {
	pub fn new(filter_set: FilterSet) -> Self {
		Self { filter_set }
	}

	pub fn filter_set(&self) -> &FilterSet {
		&self.filter_set
	}

	pub async fn filter_queryset<M: Model>(&self, manager: &Manager<M>, url: &Url) -> RestResult<Vec<M>> {
		let condition = self.filter_set.condition(url)?;
		manager.filter(condition).await.map_err(|error| match error {
			ModelError::InvalidRecord(_) | ModelError::Serialization(_) => {
				tracing::debug!(model = M::model_name(), %error, "filtering rejected");
				RestError::Validation(Value::from(vec![error.to_string()]))
			}
			other => RestError::Model(other),
		})
	}
}
