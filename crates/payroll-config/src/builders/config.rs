//! Configuration builder for creating test and development configurations.

use crate::{ApiConfig, Config, SeedConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to a single in-memory storage backend, no API section and
/// seeding disabled.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	api: Option<ApiConfig>,
	seed: bool,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			service_id: "test-payroll".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			api: None,
			seed: false,
		}
	}

	/// Sets the service ID.
	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Adds a storage implementation and makes it primary.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.storage_implementations.insert(name.clone(), config);
		self.storage_primary = name;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Enables or disables startup seeding.
	pub fn seed(mut self, enabled: bool) -> Self {
		self.seed = enabled;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			api: self.api,
			seed: SeedConfig { enabled: self.seed },
		}
	}
}
