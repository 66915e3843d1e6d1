//! Files bound to their owning record
//!
//! Uploads usually arrive before the record has a primary key, so their final
//! path (which often embeds the key) can only be computed after the insert.
//! [`BoundFilesBehavior`] moves such files once the record is created.

use crate::behavior::{Behavior, SaveContext};
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Stored file reference, serialized as the file name (or `null`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldFile {
	pub name: Option<String>,
}

impl FieldFile {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
		}
	}

	pub fn empty() -> Self {
		Self { name: None }
	}
}

/// Storage holding the bytes of [`FieldFile`]s.
#[async_trait]
pub trait FileStorage: Send + Sync {
	/// Save a file, returning the name it was stored under.
	async fn save(&self, name: &str, content: &[u8]) -> ModelResult<String>;

	async fn open(&self, name: &str) -> ModelResult<Vec<u8>>;

	async fn delete(&self, name: &str) -> ModelResult<()>;

	async fn exists(&self, name: &str) -> ModelResult<bool>;

	/// Whether [`FileStorage::move_file`] is implemented natively.
	fn supports_move(&self) -> bool {
		false
	}

	async fn move_file(&self, previous_name: &str, new_name: &str) -> ModelResult<()> {
		Err(ModelError::FileStorage(format!(
			"moving {} to {} is not supported",
			previous_name, new_name
		)))
	}
}

/// Map-backed [`FileStorage`].
#[derive(Debug, Default)]
pub struct InMemoryFileStorage {
	files: RwLock<HashMap<String, Vec<u8>>>,
	native_move: bool,
}

impl InMemoryFileStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Storage advertising a native move operation.
	pub fn with_move() -> Self {
		Self {
			files: RwLock::new(HashMap::new()),
			native_move: true,
		}
	}

	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.files.read().keys().cloned().collect();
		names.sort();
		names
	}
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
	async fn save(&self, name: &str, content: &[u8]) -> ModelResult<String> {
		self.files.write().insert(name.to_string(), content.to_vec());
		Ok(name.to_string())
	}

	async fn open(&self, name: &str) -> ModelResult<Vec<u8>> {
		self.files
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| ModelError::FileStorage(format!("file not found: {}", name)))
	}

	async fn delete(&self, name: &str) -> ModelResult<()> {
		self.files
			.write()
			.remove(name)
			.map(|_| ())
			.ok_or_else(|| ModelError::FileStorage(format!("file not found: {}", name)))
	}

	async fn exists(&self, name: &str) -> ModelResult<bool> {
		Ok(self.files.read().contains_key(name))
	}

	fn supports_move(&self) -> bool {
		self.native_move
	}

	async fn move_file(&self, previous_name: &str, new_name: &str) -> ModelResult<()> {
		if !self.native_move {
			return Err(ModelError::FileStorage("native move is disabled".to_string()));
		}
		let mut files = self.files.write();
		let content = files
			.remove(previous_name)
			.ok_or_else(|| ModelError::FileStorage(format!("file not found: {}", previous_name)))?;
		files.insert(new_name.to_string(), content);
		Ok(())
	}
}

/// A model with file fields whose final location depends on the record.
pub trait BoundFiles: Model {
	/// The file fields by name.
	fn file_fields(&self) -> Vec<(&'static str, &FieldFile)>;

	fn file_field_mut(&mut self, field: &str) -> Option<&mut FieldFile>;

	/// Final name of an upload stored in `field`. `filename` is the bare file
	/// name, without directories.
	fn upload_to(&self, field: &str, filename: &str) -> String;
}

/// Moves uploads to their generated name right after the record is created.
pub struct BoundFilesBehavior {
	storage: Arc<dyn FileStorage>,
}

impl BoundFilesBehavior {
	pub fn new(storage: Arc<dyn FileStorage>) -> Self {
		Self { storage }
	}

	async fn relocate(&self, previous_name: &str, new_name: &str) -> ModelResult<()> {
		if self.storage.supports_move() {
			self.storage.move_file(previous_name, new_name).await
		} else {
			let content = self.storage.open(previous_name).await?;
			self.storage.save(new_name, &content).await?;
			self.storage.delete(previous_name).await
		}
	}
}

#[async_trait]
impl<M: BoundFiles> Behavior<M> for BoundFilesBehavior {
	fn name(&self) -> &'static str {
		"bound_files"
	}

	async fn after_save(&self, instance: &mut M, ctx: &SaveContext<'_, M>) -> ModelResult<()> {
		if !ctx.adding {
			return Ok(());
		}

		let moves: Vec<(&'static str, String, String)> = instance
			.file_fields()
			.into_iter()
			.filter_map(|(field, file)| {
				let old = file.name.clone()?;
				let filename = Path::new(&old)
					.file_name()
					.map(|name| name.to_string_lossy().into_owned())
					.unwrap_or_else(|| old.clone());
				let new = instance.upload_to(field, &filename);
				(new != old).then_some((field, old, new))
			})
			.collect();

		if moves.is_empty() {
			return Ok(());
		}

		for (field, old, new) in moves {
			tracing::debug!(model = M::model_name(), field, from = %old, to = %new, "moving bound file");
			self.relocate(&old, &new).await?;
			if let Some(file) = instance.file_field_mut(field) {
				file.name = Some(new);
			}
		}
		ctx.store.update(instance).await
	}
}

/// Helpers to build upload paths.
pub struct StoragePath;

impl StoragePath {
	pub const SUFFIX_DELIMITER: &'static str = "_";

	/// Renames `filename`, keeping its extension.
	///
	/// Falls back to `default_extension` when the file has none. With `unique`,
	/// a random UUID is appended to the stem.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_kit_models::StoragePath;
	///
	/// assert_eq!(StoragePath::rename("uploads/photo.png", Some("avatar"), false, None), "avatar.png");
	/// assert_eq!(StoragePath::rename("README", None, false, Some("txt")), "README.txt");
	/// assert!(StoragePath::rename("photo.png", None, true, None).starts_with("photo_"));
	/// ```
	pub fn rename(
		filename: &str,
		new_name: Option<&str>,
		unique: bool,
		default_extension: Option<&str>,
	) -> String {
		let path = Path::new(filename);
		let previous_name = path
			.file_stem()
			.map(|stem| stem.to_string_lossy().into_owned())
			.unwrap_or_default();
		let extension = match (path.extension(), default_extension) {
			(Some(extension), _) => format!(".{}", extension.to_string_lossy()),
			(None, Some(default)) if !default.is_empty() => format!(".{}", default),
			_ => {
				tracing::warn!(filename, "Saving file without extension");
				String::new()
			}
		};

		let mut name = new_name.unwrap_or(&previous_name).to_string();
		if unique {
			name = format!("{}{}{}", name, Self::SUFFIX_DELIMITER, Uuid::new_v4());
		}
		format!("{}{}", name, extension)
	}

	/// The primary key as a path segment, or a fresh UUID for unsaved records.
	pub fn primary_key_segment<K: Display>(pk: Option<&K>) -> String {
		match pk {
			Some(pk) => pk.to_string(),
			None => Uuid::new_v4().to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_rename_unique_appends_uuid() {
		let renamed = StoragePath::rename("report.pdf", Some("summary"), true, None);

		let stem = renamed.strip_suffix(".pdf").unwrap();
		let suffix = stem.strip_prefix("summary_").unwrap();
		assert!(Uuid::parse_str(suffix).is_ok());
	}

	#[rstest]
	fn test_rename_without_any_extension() {
		assert_eq!(StoragePath::rename("Makefile", None, false, None), "Makefile");
	}

	#[rstest]
	fn test_primary_key_segment() {
		assert_eq!(StoragePath::primary_key_segment(Some(&42)), "42");
		let generated = StoragePath::primary_key_segment::<i64>(None);
		assert!(Uuid::parse_str(&generated).is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_in_memory_storage_move_requires_native_support() {
		let storage = InMemoryFileStorage::new();
		storage.save("a.txt", b"hello").await.unwrap();
		assert!(storage.move_file("a.txt", "b.txt").await.is_err());

		let storage = InMemoryFileStorage::with_move();
		storage.save("a.txt", b"hello").await.unwrap();
		storage.move_file("a.txt", "b.txt").await.unwrap();
		assert_eq!(storage.open("b.txt").await.unwrap(), b"hello");
		assert!(!storage.exists("a.txt").await.unwrap());
	}
}
