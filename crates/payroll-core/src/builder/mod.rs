//! Builder pattern for constructing payroll engines.
//!
//! Resolves the configured storage implementations through factory functions
//! and wires the primary one into a `PayrollEngine`.

use crate::engine::PayrollEngine;
use payroll_config::Config;
use payroll_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a `PayrollEngine`.
pub struct PayrollFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a `PayrollEngine` with a pluggable store.
pub struct PayrollBuilder {
	config: Config,
}

impl PayrollBuilder {
	/// Creates a new PayrollBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine, instantiating every configured storage
	/// implementation that has a registered factory.
	pub fn build<SF>(self, factories: PayrollFactories<SF>) -> Result<PayrollEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered, skipping");
				continue;
			};

			match factory(config) {
				Ok(implementation) => {
					// Validation already happened in the factory
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));

		Ok(PayrollEngine::new(self.config, storage))
	}
}
