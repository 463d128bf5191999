//! Lifecycle management for the payroll engine.
//!
//! Handles startup seeding and shutdown.

use super::{EngineError, PayrollEngine};
use payroll_types::{EmployeeRequest, OrderStatus, StorageKey};

const SEED_EMPLOYEES: [(&str, &str); 2] = [("Bilbo Baggins", "burglar"), ("Frodo Baggins", "thief")];
const SEED_ORDERS: [(&str, OrderStatus); 2] = [
	("MacBook Pro", OrderStatus::Completed),
	("iPhone", OrderStatus::InProgress),
];

impl PayrollEngine {
	/// Performs any initialization required before serving requests.
	///
	/// Preloads the sample records when `[seed] enabled` is set.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing payroll engine");

		if self.config.seed.enabled {
			self.seed().await?;
		}

		Ok(())
	}

	/// Stores the sample employees and orders.
	///
	/// Skipped when the store already holds records, so a persistent backend
	/// is not reseeded on every restart.
	pub async fn seed(&self) -> Result<(), EngineError> {
		for namespace in [StorageKey::Employees, StorageKey::Orders] {
			let populated = self
				.storage
				.exists(StorageKey::Sequences.as_str(), namespace.as_str())
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			if populated {
				tracing::info!(namespace = %namespace.as_str(), "Store already populated, skipping seed");
				return Ok(());
			}
		}

		for (name, role) in SEED_EMPLOYEES {
			let employee = self
				.employees
				.create(EmployeeRequest {
					name: Some(name.to_string()),
					role: role.to_string(),
					..Default::default()
				})
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			tracing::info!("Preloaded {:?}", employee);
		}

		for (description, status) in SEED_ORDERS {
			let order = self
				.orders
				.seed_order(description, status)
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			tracing::info!("Preloaded {:?}", order);
		}

		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down payroll engine");
		Ok(())
	}
}
