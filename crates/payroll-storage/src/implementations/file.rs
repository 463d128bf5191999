//! File-based storage backend for the payroll service.
//!
//! Each key is stored as one JSON file at `<storage_path>/<namespace>/<id>.json`.
//! Writes go to a temporary file that is renamed into place, so readers never
//! observe a partially written record.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use payroll_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LOCK_FILE: &str = ".lock";
const EXTENSION: &str = "json";

/// File-based storage implementation.
///
/// The storage directory is owned by a single process: an exclusive advisory
/// lock on `<storage_path>/.lock` is held for the lifetime of the instance.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Whether to fsync each file before it is renamed into place.
	sync_writes: bool,
	/// Serializes writes so compare-and-swap is atomic within the process.
	write_lock: Mutex<()>,
	/// Held only to keep the directory lock alive.
	_dir_lock: std::fs::File,
}

impl FileStorage {
	/// Opens (creating if needed) a storage directory and locks it.
	pub fn new(base_path: PathBuf, sync_writes: bool) -> Result<Self, StorageError> {
		std::fs::create_dir_all(&base_path).map_err(|e| {
			StorageError::Backend(format!(
				"Failed to create storage directory {}: {}",
				base_path.display(),
				e
			))
		})?;

		let lock_path = base_path.join(LOCK_FILE);
		let dir_lock = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(&lock_path)
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		dir_lock.try_lock_exclusive().map_err(|e| {
			StorageError::Backend(format!(
				"Storage directory {} is locked by another instance: {}",
				base_path.display(),
				e
			))
		})?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");

		Ok(Self {
			base_path,
			sync_writes,
			write_lock: Mutex::new(()),
			_dir_lock: dir_lock,
		})
	}

	/// Converts a storage key to its file path.
	///
	/// Path separators in either half of the key are neutralized so a key can
	/// never escape its namespace directory.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("_", key));
		let safe = |part: &str| part.replace(['/', '\\'], "_").replace("..", "_");
		self.base_path
			.join(safe(namespace))
			.join(format!("{}.{}", safe(id), EXTENSION))
	}

	async fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(path).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	/// Writes a file atomically. Callers must hold `write_lock`.
	async fn write_file(&self, path: &Path, value: &[u8]) -> Result<(), StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.write_all(value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		if self.sync_writes {
			file.sync_all()
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}
		drop(file);

		fs::rename(&temp_path, path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_optional(&self.get_file_path(key))
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.write_file(&self.get_file_path(key), &value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		// Any id resolves into the namespace directory
		let dir = match self.get_file_path(&format!("{}:_", namespace)).parent() {
			Some(dir) => dir.to_path_buf(),
			None => return Ok(Vec::new()),
		};

		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(EXTENSION)) {
				continue;
			}
			match path.file_stem().and_then(|s| s.to_str()) {
				Some(id) => keys.push(format!("{}:{}", namespace, id)),
				None => tracing::debug!("Skipping non UTF-8 file {:?}", path),
			}
		}

		Ok(keys)
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<Vec<u8>>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let _guard = self.write_lock.lock().await;
		let path = self.get_file_path(key);

		if self.read_optional(&path).await? != expected {
			return Ok(false);
		}

		self.write_file(&path, &value).await?;
		Ok(true)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![], // No required fields
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if !path.trim().is_empty() => Ok(()),
						_ => Err("storage_path cannot be empty".to_string()),
					}
				}),
				Field::new("sync_writes", FieldType::Boolean),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `sync_writes`: fsync every write before it becomes visible (default: false)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");
	let sync_writes = config
		.get("sync_writes")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		sync_writes,
	)?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_basic_operations() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), false).unwrap();

		storage.set_bytes("orders:1", b"{}".to_vec()).await.unwrap();
		assert!(dir.path().join("orders").join("1.json").exists());
		assert_eq!(storage.get_bytes("orders:1").await.unwrap(), b"{}".to_vec());
		assert!(storage.exists("orders:1").await.unwrap());

		storage.delete("orders:1").await.unwrap();
		assert!(!storage.exists("orders:1").await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:1").await,
			Err(StorageError::NotFound)
		));
		storage.delete("orders:1").await.unwrap();
	}

	#[tokio::test]
	async fn test_persists_across_instances() {
		let dir = TempDir::new().unwrap();
		{
			let storage = FileStorage::new(dir.path().to_path_buf(), true).unwrap();
			storage.set_bytes("employees:4", b"frodo".to_vec()).await.unwrap();
		}

		let reopened = FileStorage::new(dir.path().to_path_buf(), false).unwrap();
		assert_eq!(
			reopened.get_bytes("employees:4").await.unwrap(),
			b"frodo".to_vec()
		);
	}

	#[tokio::test]
	async fn test_list_keys_ignores_temp_files() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), false).unwrap();
		storage.set_bytes("orders:1", vec![1]).await.unwrap();
		storage.set_bytes("orders:2", vec![2]).await.unwrap();
		std::fs::write(dir.path().join("orders").join("3.tmp"), b"partial").unwrap();

		let mut keys = storage.list_keys("orders").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:1".to_string(), "orders:2".to_string()]);

		assert!(storage.list_keys("employees").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_compare_and_swap() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), false).unwrap();

		assert!(storage
			.compare_and_swap("sequences:orders", None, b"1".to_vec())
			.await
			.unwrap());
		assert!(!storage
			.compare_and_swap("sequences:orders", None, b"1".to_vec())
			.await
			.unwrap());
		assert!(storage
			.compare_and_swap("sequences:orders", Some(b"1".to_vec()), b"2".to_vec())
			.await
			.unwrap());
		assert_eq!(
			storage.get_bytes("sequences:orders").await.unwrap(),
			b"2".to_vec()
		);
	}

	#[test]
	fn test_key_cannot_escape_namespace() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), false).unwrap();

		let path = storage.get_file_path("orders:../../etc/passwd");
		assert!(path.starts_with(dir.path().join("orders")));
	}

	#[test]
	fn test_directory_lock_is_exclusive() {
		let dir = TempDir::new().unwrap();
		let _first = FileStorage::new(dir.path().to_path_buf(), false).unwrap();

		let second = FileStorage::new(dir.path().to_path_buf(), false);
		assert!(matches!(second, Err(StorageError::Backend(msg)) if msg.contains("locked")));
	}

	#[test]
	fn test_factory_validates_config() {
		let config: toml::Value = toml::from_str("sync_writes = \"always\"").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
