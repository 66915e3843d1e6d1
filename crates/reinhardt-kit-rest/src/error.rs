//! Error types for the REST helpers.

use crate::exceptions::{ConflictError, IntegrityViolation};
use http::StatusCode;
use reinhardt_kit_models::ModelError;
use thiserror::Error;

/// Errors raised by views built on the REST helpers.
#[derive(Debug, Error)]
pub enum RestError {
	/// A storage integrity error that was recognized and translated.
	#[error(transparent)]
	Integrity(#[from] IntegrityViolation),

	/// The record collides with existing ones.
	#[error(transparent)]
	Conflict(#[from] ConflictError),

	#[error("{0}")]
	NotFound(String),

	/// Request data was rejected. The payload is returned as-is under `errors`.
	#[error("{0}")]
	Validation(serde_json::Value),

	#[error(transparent)]
	Model(#[from] ModelError),

	#[error("Cache error: {0}")]
	Cache(String),

	#[error("Invalid header value: {0}")]
	InvalidHeader(String),

	#[error("Invalid settings: {0}")]
	Settings(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl RestError {
	/// HTTP status this error maps to.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::Integrity(violation) => violation.status_code(),
			Self::Conflict(_) => StatusCode::CONFLICT,
			Self::NotFound(_) => StatusCode::NOT_FOUND,
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::Model(error) => match error {
				ModelError::NotFound { .. } => StatusCode::NOT_FOUND,
				ModelError::UpdatingSoftDeleted
				| ModelError::Validation { .. }
				| ModelError::Integrity(_) => StatusCode::BAD_REQUEST,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			},
			Self::Cache(_)
			| Self::InvalidHeader(_)
			| Self::Settings(_)
			| Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Result type alias for REST helper operations.
pub type RestResult<T> = Result<T, RestError>;
