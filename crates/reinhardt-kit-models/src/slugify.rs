//! Slug fields normalized on save

use crate::behavior::{Behavior, SaveContext};
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, as_dict, from_dict};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;

/// Default upper bound of a slug, in characters.
pub const DEFAULT_SLUG_MAX_LENGTH: usize = 50;

/// Rewrites string fields into slugs on every external save.
///
/// Whatever the field holds when the save starts is passed through the slug
/// function (lowercase ASCII words joined by `-` by default). `null` values
/// are left alone; a slug longer than the maximum length is rejected.
///
/// # Examples
///
/// ```
/// use reinhardt_kit_models::{InMemoryStore, Manager, Model, SlugifyBehavior};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Genre { id: Option<i64>, slug: String }
///
/// impl Model for Genre {
///     type PrimaryKey = i64;
///     fn table_name() -> &'static str { "genres" }
///     fn model_name() -> &'static str { "Genre" }
///     fn primary_key(&self) -> Option<&i64> { self.id.as_ref() }
///     fn set_primary_key(&mut self, pk: i64) { self.id = Some(pk); }
/// }
///
/// # tokio_test::block_on(async {
/// let genres = Manager::new(Arc::new(InMemoryStore::<Genre>::new()))
///     .with_behavior(SlugifyBehavior::new(&["slug"]));
///
/// let genre = genres.create(Genre { id: None, slug: "Drum & Bass".into() }).await.unwrap();
/// assert_eq!(genre.slug, "drum-bass");
/// # });
/// ```
pub struct SlugifyBehavior<M> {
	fields: Vec<String>,
	max_length: usize,
	func: fn(&str) -> String,
	_model: PhantomData<fn() -> M>,
}

impl<M: Model> SlugifyBehavior<M> {
	pub fn new(fields: &[&str]) -> Self {
		Self {
			fields: fields.iter().map(|f| f.to_string()).collect(),
			max_length: DEFAULT_SLUG_MAX_LENGTH,
			func: slugify,
			_model: PhantomData,
		}
	}

	pub fn max_length(mut self, max_length: usize) -> Self {
		self.max_length = max_length;
		self
	}

	/// Replaces the slug function.
	pub fn with_func(mut self, func: fn(&str) -> String) -> Self {
		self.func = func;
		self
	}

	fn slug_for(&self, field: &str, value: &Value) -> ModelResult<Option<String>> {
		let raw = match value {
			Value::Null => return Ok(None),
			Value::String(raw) => raw,
			_ => {
				return Err(ModelError::Validation {
					field: field.to_string(),
					message: "Enter a valid slug.".to_string(),
				});
			}
		};
		let slug = (self.func)(raw);
		let length = slug.chars().count();
		if length > self.max_length {
			return Err(ModelError::Validation {
				field: field.to_string(),
				message: format!(
					"Ensure this value has at most {} characters (it has {}).",
					self.max_length, length
				),
			});
		}
		Ok(Some(slug))
	}
}

#[async_trait]
impl<M: Model> Behavior<M> for SlugifyBehavior<M> {
	fn name(&self) -> &'static str {
		"slugify"
	}

	async fn before_save(&self, instance: &mut M, _ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		let mut row = as_dict(instance)?;
		let mut changed = false;
		for field in &self.fields {
			let Some(value) = row.get(field) else {
				return Err(ModelError::InvalidRecord(format!(
					"{} has no field `{}` to slugify",
					M::model_name(),
					field
				)));
			};
			if let Some(slug) = self.slug_for(field, value)?
				&& value.as_str() != Some(slug.as_str())
			{
				row.insert(field.clone(), Value::String(slug));
				changed = true;
			}
		}
		if changed {
			*instance = from_dict(row)?;
		}
		Ok(())
	}
}

/// Lowercase ASCII slug: words transliterated and joined by `-`.
pub fn slugify(value: &str) -> String {
	::slug::slugify(value)
}
