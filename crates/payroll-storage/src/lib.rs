//! Storage module for the payroll service.
//!
//! This module provides the persistence abstraction the services are built
//! on: a low-level byte-oriented [`StorageInterface`] implemented by each
//! backend, and a typed [`StorageService`] that handles serialization, id
//! assignment and compare-and-set updates on top of it.

use async_trait::async_trait;
use payroll_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The id sequence for a namespace has no ids left.
	#[error("Id sequence exhausted for {0}")]
	SequenceExhausted(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `namespace:id`. Backends must make
/// [`compare_and_swap`](StorageInterface::compare_and_swap) atomic with
/// respect to every other write on the same key.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, creating or overwriting the key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Deleting a missing
	/// key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key in the given namespace.
	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;

	/// Writes `value` only if the key currently holds `expected`.
	///
	/// `expected = None` means the key must be absent. Returns `Ok(false)`
	/// without writing when the current value differs.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<Vec<u8>>,
		value: Vec<u8>,
	) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// A record read together with the exact bytes it was decoded from.
///
/// The bytes act as the version token for
/// [`StorageService::replace_if_unchanged`].
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	version: Vec<u8>,
}

/// High-level storage service that provides typed operations.
///
/// Wraps a low-level backend and stores values as JSON under
/// `namespace:id` keys.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value along with its version token.
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let version = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		let value = serde_json::from_slice(&version)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Versioned { value, version })
	}

	/// Retrieves and deserializes every value in a namespace.
	///
	/// Keys removed between listing and reading are skipped. No ordering is
	/// guaranteed.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let keys = self.backend.list_keys(namespace).await?;
		let mut values = Vec::with_capacity(keys.len());

		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(
					serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
				),
				Err(StorageError::NotFound) => {
					tracing::debug!(key = %key, "Key vanished while listing");
				},
				Err(e) => return Err(e),
			}
		}

		Ok(values)
	}

	/// Removes a value from storage. Removing a missing value succeeds.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Stores a value only if nothing is stored under the key yet.
	///
	/// Returns `Ok(false)` without writing when the key is taken.
	pub async fn insert<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<bool, StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_swap(&Self::key(namespace, id), None, bytes)
			.await
	}

	/// Writes `data` only if the stored value is still the one `current` was
	/// read from.
	///
	/// Returns `Ok(false)` if another writer changed or removed the value in
	/// the meantime.
	pub async fn replace_if_unchanged<T: Serialize, U>(
		&self,
		namespace: &str,
		id: &str,
		current: &Versioned<U>,
		data: &T,
	) -> Result<bool, StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_swap(
				&Self::key(namespace, id),
				Some(current.version.clone()),
				bytes,
			)
			.await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Reads the last id handed out for a namespace, or `None` if no id has
	/// been assigned yet.
	async fn read_sequence(&self, namespace: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let key = Self::key(StorageKey::Sequences.as_str(), namespace);
		match self.backend.get_bytes(&key).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	fn decode_sequence(bytes: Option<&Vec<u8>>) -> Result<u64, StorageError> {
		match bytes {
			Some(bytes) => serde_json::from_slice(bytes)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			None => Ok(0),
		}
	}

	/// Atomically allocates the next id for a namespace. Ids start at 1.
	pub async fn next_id(&self, namespace: &str) -> Result<u64, StorageError> {
		let key = Self::key(StorageKey::Sequences.as_str(), namespace);

		loop {
			let current = self.read_sequence(namespace).await?;
			let next = Self::decode_sequence(current.as_ref())?
				.checked_add(1)
				.ok_or_else(|| StorageError::SequenceExhausted(namespace.to_string()))?;
			let bytes =
				serde_json::to_vec(&next).map_err(|e| StorageError::Serialization(e.to_string()))?;

			if self.backend.compare_and_swap(&key, current, bytes).await? {
				return Ok(next);
			}
		}
	}

	/// Ensures the sequence for a namespace is at least `id`, so that
	/// [`next_id`](Self::next_id) never hands out an id that was stored
	/// explicitly.
	pub async fn advance_sequence(&self, namespace: &str, id: u64) -> Result<(), StorageError> {
		let key = Self::key(StorageKey::Sequences.as_str(), namespace);

		loop {
			let current = self.read_sequence(namespace).await?;
			if Self::decode_sequence(current.as_ref())? >= id {
				return Ok(());
			}
			let bytes =
				serde_json::to_vec(&id).map_err(|e| StorageError::Serialization(e.to_string()))?;

			if self.backend.compare_and_swap(&key, current, bytes).await? {
				return Ok(());
			}
		}
	}
}
