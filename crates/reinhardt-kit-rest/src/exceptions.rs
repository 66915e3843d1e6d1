//! Translation of storage errors into API responses
//!
//! Databases report constraint violations as free-form text. This module
//! recognizes the SQLite and PostgreSQL wordings and turns them into errors an
//! API client can act on:
//!
//! | Violation                    | Status | Body                                                       |
//! |------------------------------|--------|------------------------------------------------------------|
//! | unique                       | 409    | ``A Model with `field=value` already exists.``             |
//! | check                        | 400    | ``This Model violates the check `name` which states `…` `` |
//! | exclusion (PostgreSQL only)  | 409    | ``This Model violates exclusion constraint `name` ``       |
//!
//! Every handled error is rendered as `{"errors": <message>}`.

use crate::error::RestError;
use http::StatusCode;
use regex::Regex;
use reinhardt_kit_models::{Constraint, FilterCondition, FilterValue, IntegrityError, Model, ModelError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

// `Key (a, b)=(1, 2) already exists.`
static DUPLICATE_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"Key \((?P<keys>.*)\)=\((?P<values>.*)\)")
		.expect("DUPLICATE_KEY_REGEX: invalid regex pattern")
});

static CHECK_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"violates check constraint "(?P<name>.*)""#)
		.expect("CHECK_NAME_REGEX: invalid regex pattern")
});

static EXCLUSION_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"violates exclusion constraint "(?P<name>.*)""#)
		.expect("EXCLUSION_NAME_REGEX: invalid regex pattern")
});

/// Database flavour whose error wording is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
	#[default]
	Sqlite,
	Postgresql,
}

/// What the handler knows about the failed request.
#[derive(Debug, Clone)]
pub struct ExceptionContext {
	model: String,
	checks: Vec<(String, String)>,
	body: Value,
	engine: DatabaseEngine,
}

impl ExceptionContext {
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			checks: Vec::new(),
			body: Value::Null,
			engine: DatabaseEngine::default(),
		}
	}

	/// Context for a view over `M`, carrying the descriptions of its check
	/// constraints.
	///
	/// # Examples
	///
	/// ```
	/// use chrono::{DateTime, Utc};
	/// use reinhardt_kit_models::{Available, Constraint, IntegrityError, Model, availability_constraint};
	/// use reinhardt_kit_rest::{DatabaseEngine, ExceptionContext, IntegrityViolation};
	/// use serde::{Deserialize, Serialize};
	///
	/// #[derive(Clone, Serialize, Deserialize)]
	/// struct Campaign {
	///     id: Option<i64>,
	///     starts_at: Option<DateTime<Utc>>,
	///     ends_at: Option<DateTime<Utc>>,
	/// }
	///
	/// impl Model for Campaign {
	///     type PrimaryKey = i64;
	///     fn table_name() -> &'static str { "campaigns" }
	///     fn model_name() -> &'static str { "Campaign" }
	///     fn primary_key(&self) -> Option<&i64> { self.id.as_ref() }
	///     fn set_primary_key(&mut self, pk: i64) { self.id = Some(pk); }
	///     fn constraints() -> Vec<Constraint> { vec![availability_constraint::<Self>()] }
	/// }
	///
	/// impl Available for Campaign {
	///     fn starts_at(&self) -> Option<DateTime<Utc>> { self.starts_at }
	///     fn ends_at(&self) -> Option<DateTime<Utc>> { self.ends_at }
	/// }
	///
	/// let ctx = ExceptionContext::for_model::<Campaign>()
	///     .with_body(serde_json::json!({"name": "Spring"}))
	///     .with_engine(DatabaseEngine::Postgresql);
	/// assert_eq!(ctx.model(), "Campaign");
	///
	/// let error = IntegrityError::new(
	///     "new row for relation \"campaigns\" violates check constraint \"campaigns_invalid_date_range\"",
	/// );
	/// let violation = IntegrityViolation::classify(&error, &ctx).unwrap();
	/// assert_eq!(
	///     violation.to_string(),
	///     "This Campaign violates the check `campaigns_invalid_date_range` which states `starts_at <= ends_at`",
	/// );
	/// ```
	pub fn for_model<M: Model>() -> Self {
		let mut ctx = Self::new(M::model_name());
		for constraint in M::constraints() {
			if let Constraint::Check {
				name, description, ..
			} = constraint
			{
				ctx.checks.push((name, description));
			}
		}
		ctx
	}

	pub fn with_check(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
		self.checks.push((name.into(), description.into()));
		self
	}

	/// Request payload. SQLite does not echo the offending values, so they
	/// are read from here.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = body;
		self
	}

	pub fn with_engine(mut self, engine: DatabaseEngine) -> Self {
		self.engine = engine;
		self
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn engine(&self) -> DatabaseEngine {
		self.engine
	}

	fn check_description(&self, name: &str) -> Option<String> {
		self.checks
			.iter()
			.find(|(check, _)| check == name)
			.map(|(_, description)| description.clone())
	}
}

/// A recognized constraint violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityViolation {
	#[error("A {model} with `{}` already exists.", describe_pairs(.keys, .values))]
	DuplicatedRecord {
		model: String,
		keys: Vec<String>,
		values: Vec<Value>,
	},

	#[error("This {model} violates the check `{name}` which states `{}`", .check.as_deref().unwrap_or(""))]
	InvalidRecord {
		model: String,
		name: String,
		/// Description of the violated check, when the model declares it.
		check: Option<String>,
	},

	#[error("This {model} violates exclusion constraint `{name}`")]
	ExclusionDuplicatedRecord {
		model: String,
		name: String,
		keys: Vec<String>,
		values: Vec<Value>,
	},
}

impl IntegrityViolation {
	/// Recognizes `error`, or returns `None` when the wording is unknown.
	pub fn classify(error: &IntegrityError, ctx: &ExceptionContext) -> Option<Self> {
		let message = error.message.as_str();
		if message.contains("UNIQUE constraint failed")
			|| message.contains("duplicate key value violates unique")
		{
			let (keys, values) = match ctx.engine {
				DatabaseEngine::Sqlite => parse_sqlite_unique(message, &ctx.body),
				DatabaseEngine::Postgresql => parse_postgres_unique(message),
			};
			return Some(Self::DuplicatedRecord {
				model: ctx.model.clone(),
				keys,
				values,
			});
		}

		if message.contains("CHECK constraint failed") || message.contains("violates check constraint") {
			let name = match ctx.engine {
				DatabaseEngine::Sqlite => Some(after_last_colon(message).to_string()),
				DatabaseEngine::Postgresql => capture_name(&CHECK_NAME_REGEX, message),
			}?;
			let check = ctx.check_description(&name);
			return Some(Self::InvalidRecord {
				model: ctx.model.clone(),
				name,
				check,
			});
		}

		// Only PostgreSQL has exclusion constraints
		if message.contains("violates exclusion constraint") {
			let name = capture_name(&EXCLUSION_NAME_REGEX, message)?;
			let (keys, values) = parse_exclusion_key(message);
			return Some(Self::ExclusionDuplicatedRecord {
				model: ctx.model.clone(),
				name,
				keys,
				values,
			});
		}

		None
	}

	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::DuplicatedRecord { .. } | Self::ExclusionDuplicatedRecord { .. } => {
				StatusCode::CONFLICT
			}
			Self::InvalidRecord { .. } => StatusCode::BAD_REQUEST,
		}
	}

	/// Colliding fields and their values. Empty for check violations.
	pub fn params(&self) -> Map<String, Value> {
		match self {
			Self::DuplicatedRecord { keys, values, .. }
			| Self::ExclusionDuplicatedRecord { keys, values, .. } => keys
				.iter()
				.cloned()
				.zip(values.iter().cloned())
				.collect(),
			Self::InvalidRecord { .. } => Map::new(),
		}
	}

	/// Filter matching the record this one collides with.
	pub fn conflict_filter(&self) -> FilterCondition {
		let conditions = self
			.params()
			.into_iter()
			.map(|(field, value)| FilterCondition::eq(&field, FilterValue::from_json(&value)))
			.collect();
		FilterCondition::and(conditions)
	}

	pub fn response(&self) -> ErrorResponse {
		ErrorResponse::new(self.status_code(), Value::String(self.to_string()))
	}
}

/// A record collides with existing ones that the database cannot express as a
/// single constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
	with_models: Vec<String>,
	message: Option<String>,
}

impl ConflictError {
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_rest::ConflictError;
	///
	/// let error = ConflictError::new(["Booking 1", "Booking 4"]);
	/// assert_eq!(error.to_string(), "Model is duplicated with Booking 1 | Booking 4");
	/// ```
	pub fn new<I, S>(with_models: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: fmt::Display,
	{
		Self {
			with_models: with_models.into_iter().map(|m| m.to_string()).collect(),
			message: None,
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with_models(&self) -> &[String] {
		&self.with_models
	}
}

impl fmt::Display for ConflictError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.message {
			Some(message) => f.write_str(message),
			None => write!(f, "Model is duplicated with {}", self.with_models.join(" | ")),
		}
	}
}

impl std::error::Error for ConflictError {}

/// Status and JSON body of a handled error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
	#[serde(skip)]
	pub status: StatusCode,
	pub body: Value,
}

impl ErrorResponse {
	/// Wraps `errors` as `{"errors": errors}`.
	pub fn new(status: StatusCode, errors: Value) -> Self {
		Self {
			status,
			body: json!({ "errors": errors }),
		}
	}
}

/// Turns known errors into `{"errors": ...}` responses.
///
/// Returns `None` for errors that should fall through to the framework's
/// default handling, including integrity errors with unrecognized wording.
pub fn exception_handler(error: &RestError, ctx: &ExceptionContext) -> Option<ErrorResponse> {
	match error {
		RestError::Integrity(violation) => Some(violation.response()),
		RestError::Conflict(conflict) => Some(ErrorResponse::new(
			StatusCode::CONFLICT,
			Value::String(conflict.to_string()),
		)),
		RestError::NotFound(message) => Some(ErrorResponse::new(
			StatusCode::NOT_FOUND,
			Value::String(message.clone()),
		)),
		RestError::Validation(errors) => {
			Some(ErrorResponse::new(StatusCode::BAD_REQUEST, errors.clone()))
		}
		RestError::Model(model_error) => handle_model_error(model_error, ctx),
		_ => None,
	}
}

fn handle_model_error(error: &ModelError, ctx: &ExceptionContext) -> Option<ErrorResponse> {
	match error {
		ModelError::Integrity(integrity) => {
			IntegrityViolation::classify(integrity, ctx).map(|violation| violation.response())
		}
		ModelError::UpdatingSoftDeleted => Some(ErrorResponse::new(
			StatusCode::BAD_REQUEST,
			Value::String(error.to_string()),
		)),
		ModelError::NotFound { .. } => Some(ErrorResponse::new(
			StatusCode::NOT_FOUND,
			Value::String(error.to_string()),
		)),
		ModelError::Validation { field, message } => {
			let mut errors = Map::new();
			errors.insert(field.clone(), json!([message]));
			Some(ErrorResponse::new(StatusCode::BAD_REQUEST, Value::Object(errors)))
		}
		_ => None,
	}
}

fn after_last_colon(message: &str) -> &str {
	message.rsplit(':').next().unwrap_or(message).trim()
}

fn capture_name(regex: &Regex, message: &str) -> Option<String> {
	let first_line = message.lines().next().unwrap_or(message);
	let name = regex
		.captures(first_line)
		.and_then(|captures| captures.name("name"))
		.map(|name| name.as_str().to_string());
	if name.is_none() {
		warn!("Unable to detect constraint name for error: {}", first_line);
	}
	name
}

// `UNIQUE constraint failed: table.a, table.b`
fn parse_sqlite_unique(message: &str, body: &Value) -> (Vec<String>, Vec<Value>) {
	let keys: Vec<String> = after_last_colon(message)
		.split(',')
		.map(|item| item.rsplit('.').next().unwrap_or(item).trim().to_string())
		.collect();
	let values = keys
		.iter()
		.map(|key| body.get(key).cloned().unwrap_or(Value::Null))
		.collect();
	(keys, values)
}

// duplicate key value violates unique constraint "<name>"
// DETAIL:  Key (a, b)=(1, 2) already exists.
fn parse_postgres_unique(message: &str) -> (Vec<String>, Vec<Value>) {
	let detail = message.lines().last().unwrap_or(message);
	let Some(captures) = DUPLICATE_KEY_REGEX.captures(detail) else {
		warn!("Unable to detect constraints for error: {}", detail);
		return (Vec::new(), Vec::new());
	};
	let split = |name: &str| -> Vec<String> {
		captures
			.name(name)
			.map(|group| group.as_str().split(',').map(|item| item.trim().to_string()).collect())
			.unwrap_or_default()
	};
	let keys = split("keys");
	let values = split("values").into_iter().map(Value::String).collect();
	(keys, values)
}

// conflicting key value violates exclusion constraint "<name>"
// DETAIL:  Key (a, b)=(..) conflicts with existing key (a, b)=(1, [x,y)).
fn parse_exclusion_key(message: &str) -> (Vec<String>, Vec<Value>) {
	let Some(existing) = message
		.lines()
		.nth(1)
		.and_then(|detail| detail.rsplit("conflicts with existing key").next())
		.map(str::trim)
	else {
		warn!("Unable to detect conflicting key for error: {}", message);
		return (Vec::new(), Vec::new());
	};
	let Some((keys, values)) = existing.split_once('=') else {
		warn!("Unable to detect conflicting key for error: {}", existing);
		return (Vec::new(), Vec::new());
	};

	let keys = strip_parens(keys)
		.split(',')
		.map(|key| key.trim().to_string())
		.collect();
	let values = split_top_level(strip_parens(values.trim_end_matches('.')))
		.into_iter()
		.map(|value| {
			if let Some(inner) = value
				.strip_prefix(['[', '('])
				.and_then(|rest| rest.strip_suffix([']', ')']))
			{
				Value::Array(inner.split(',').map(nullable).collect())
			} else {
				nullable(value)
			}
		})
		.collect();
	(keys, values)
}

fn strip_parens(text: &str) -> &str {
	let text = text.trim();
	text.strip_prefix('(')
		.and_then(|rest| rest.strip_suffix(')'))
		.unwrap_or(text)
}

// Splits on commas outside of range brackets: `1, [a,b)` -> [`1`, `[a,b)`]
fn split_top_level(text: &str) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;
	for (index, ch) in text.char_indices() {
		match ch {
			'[' | '(' => depth += 1,
			']' | ')' => depth = depth.saturating_sub(1),
			',' if depth == 0 => {
				parts.push(text[start..index].trim());
				start = index + 1;
			}
			_ => {}
		}
	}
	parts.push(text[start..].trim());
	parts
}

fn nullable(value: &str) -> Value {
	match value.trim() {
		"" => Value::Null,
		trimmed => Value::String(trimmed.to_string()),
	}
}

fn describe_pairs(keys: &[String], values: &[Value]) -> String {
	keys.iter()
		.zip(values)
		.map(|(key, value)| match value {
			Value::String(text) => format!("{}={}", key, text),
			other => format!("{}={}", key, other),
		})
		.collect::<Vec<_>>()
		.join(" and ")
}
