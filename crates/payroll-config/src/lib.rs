//! Configuration module for the payroll service.
//!
//! This module provides structures and utilities for managing service configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the payroll service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
	/// Sample data loaded at startup.
	#[serde(default)]
	pub seed: SeedConfig,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for startup seeding.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SeedConfig {
	/// Whether to preload the sample employees and orders.
	#[serde(default)]
	pub enabled: bool,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Public base URL prepended to hypermedia links, e.g.
	/// `http://localhost:8080`. Links are path-only when unset.
	pub public_url: Option<String>,
	/// CORS configuration. Permissive when unset.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			max_request_size: default_max_request_size(),
			public_url: None,
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
	/// Allowed headers for CORS.
	pub allowed_headers: Vec<String>,
	/// Allowed methods for CORS.
	pub allowed_methods: Vec<String>,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	8080
}

/// Returns the default maximum request size in bytes.
fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}

	result.push_str(&input[last_end..]);
	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the configuration of the primary storage implementation.
	pub fn primary_storage(&self) -> Option<&toml::Value> {
		self.storage.implementations.get(&self.storage.primary)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Ensures the service ID is not empty
	/// - Checks that at least one storage implementation is configured
	/// - Verifies the primary storage names a configured implementation
	/// - Validates API host, port and public URL when the API is enabled
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if self.primary_storage().is_none() {
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if let Some(ref api) = self.api {
			if api.enabled {
				if api.host.is_empty() {
					return Err(ConfigError::Validation("API host cannot be empty".into()));
				}
				if api.port == 0 {
					return Err(ConfigError::Validation(
						"API port must be greater than 0".into(),
					));
				}
				if api.max_request_size == 0 {
					return Err(ConfigError::Validation(
						"API max_request_size must be greater than 0".into(),
					));
				}
				if let Some(ref url) = api.public_url {
					if !(url.starts_with("http://") || url.starts_with("https://")) {
						return Err(ConfigError::Validation(format!(
							"API public_url '{}' must start with http:// or https://",
							url
						)));
					}
				}
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is automatically
/// validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("PAYROLL_TEST_HOST", "localhost");
		std::env::set_var("PAYROLL_TEST_PORT", "5432");

		let input = "host = \"${PAYROLL_TEST_HOST}:${PAYROLL_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("PAYROLL_TEST_HOST");
		std::env::remove_var("PAYROLL_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${PAYROLL_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${PAYROLL_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("PAYROLL_MISSING_VAR"));
	}

	#[test]
	fn test_full_config() {
		std::env::set_var("PAYROLL_TEST_SERVICE_ID", "payroll-test");

		let config_str = r#"
[service]
id = "${PAYROLL_TEST_SERVICE_ID}"

[storage]
primary = "file"
[storage.implementations.memory]
[storage.implementations.file]
storage_path = "./data/storage"

[api]
enabled = true
port = 9090
public_url = "http://localhost:9090"
[api.cors]
allowed_origins = ["http://localhost:3000"]
allowed_headers = ["content-type"]
allowed_methods = ["GET", "POST"]

[seed]
enabled = true
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "payroll-test");
		assert_eq!(config.storage.primary, "file");
		assert!(config.primary_storage().is_some());
		assert!(config.seed.enabled);

		let api = config.api.unwrap();
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 9090);
		assert_eq!(api.max_request_size, 1024 * 1024);
		assert_eq!(api.cors.unwrap().allowed_methods, vec!["GET", "POST"]);

		std::env::remove_var("PAYROLL_TEST_SERVICE_ID");
	}

	#[test]
	fn test_seed_defaults_to_disabled() {
		let config_str = r#"
[service]
id = "payroll"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

		let config: Config = config_str.parse().unwrap();
		assert!(!config.seed.enabled);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_unknown_primary_storage_rejected() {
		let config_str = r#"
[service]
id = "payroll"

[storage]
primary = "redis"
[storage.implementations.memory]
"#;

		let err = Config::from_str(config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary storage 'redis' not found in implementations"));
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = r#"
[service]
id = ""

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

		let err = Config::from_str(config_str).unwrap_err();
		assert!(err.to_string().contains("Service ID cannot be empty"));
	}

	#[test]
	fn test_invalid_public_url_rejected() {
		let config_str = r#"
[service]
id = "payroll"

[storage]
primary = "memory"
[storage.implementations.memory]

[api]
enabled = true
public_url = "localhost:8080"
"#;

		let err = Config::from_str(config_str).unwrap_err();
		assert!(err.to_string().contains("must start with http://"));
	}
}
