//! Error types for model behaviors and storage.

use crate::signals::SignalError;
use thiserror::Error;

/// Errors raised while saving, deleting, or querying models.
#[derive(Debug, Error)]
pub enum ModelError {
	/// No row exists for the given primary key.
	///
	/// Cascaded renumbering surfaces this when a sibling disappears between
	/// the snapshot read and the position write.
	#[error("{model} matching query does not exist (pk={pk})")]
	NotFound {
		/// Model name.
		model: String,
		/// Primary key that was looked up.
		pk: String,
	},

	/// An already soft-deleted instance was saved through the external pipeline.
	#[error("It's not possible to save changes to a soft deleted model. Undelete it first.")]
	UpdatingSoftDeleted,

	/// The grouping key of an ordered model cannot be resolved.
	#[error("Invalid grouping for {model}: {reason}")]
	InvalidGrouping {
		/// Model name.
		model: String,
		/// What is wrong with the configuration.
		reason: String,
	},

	/// A declared unique or check constraint was violated.
	#[error(transparent)]
	Integrity(#[from] IntegrityError),

	/// A field value was rejected.
	#[error("Validation error: {field}: {message}")]
	Validation {
		/// Field that failed validation.
		field: String,
		/// Validation error message.
		message: String,
	},

	/// The model did not serialize into a field map.
	#[error("Invalid record: {0}")]
	InvalidRecord(String),

	/// JSON serialization/deserialization error.
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// A signal receiver failed.
	#[error("Signal error: {0}")]
	Signal(#[from] SignalError),

	/// File storage backend failure.
	#[error("File storage error: {0}")]
	FileStorage(String),
}

impl ModelError {
	/// Builds a [`ModelError::NotFound`] for model `M`.
	pub fn not_found<M: crate::Model>(pk: &M::PrimaryKey) -> Self {
		Self::NotFound {
			model: M::model_name().to_string(),
			pk: pk.to_string(),
		}
	}

	/// Returns `true` for constraint violations reported by the store.
	pub fn is_integrity_error(&self) -> bool {
		matches!(self, Self::Integrity(_))
	}
}

/// A constraint violation, worded the way the database reports it.
///
/// The in-memory store uses the SQLite wording
/// (`UNIQUE constraint failed: table.field`, `CHECK constraint failed: name`),
/// which is what the REST layer parses back into conflict responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct IntegrityError {
	/// Raw driver message.
	pub message: String,
}

impl IntegrityError {
	/// Creates an integrity error from a raw driver message.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_updating_soft_deleted_message() {
		let error = ModelError::UpdatingSoftDeleted;
		assert_eq!(
			error.to_string(),
			"It's not possible to save changes to a soft deleted model. Undelete it first."
		);
	}

	#[rstest]
	fn test_integrity_error_is_transparent() {
		let error: ModelError =
			IntegrityError::new("UNIQUE constraint failed: placements.prize").into();
		assert!(error.is_integrity_error());
		assert_eq!(error.to_string(), "UNIQUE constraint failed: placements.prize");
	}
}
